use std::cell::RefCell;
use std::rc::Rc;

use segseq::{SegmentedSequence, SequenceOptions, SharedList};

fn main() -> segseq::Result<()> {
    let backing = Rc::new(RefCell::new(vec!["alpha".to_string(), "beta".to_string()]));
    let list: SharedList<String> = backing.clone();

    let opts = SequenceOptions::new().value_names();
    let mut names = SegmentedSequence::wrapping(list, opts)?;
    names.add("gamma".into())?;

    println!("index_of_name(\"BETA\") = {:?}", names.index_of_name("BETA")?);
    match names.add("Alpha".into()) {
        Ok(_) => println!("added a duplicate"),
        Err(err) => println!("rejected: {err}"),
    }

    println!("backing vec = {:?}", backing.borrow());

    let detached = names.detach_external()?;
    println!(
        "detached: wrapped={} len={} list_len={:?}",
        names.is_wrapped(),
        names.len(),
        detached.map(|l| l.borrow().len())
    );
    Ok(())
}
