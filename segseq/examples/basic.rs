use segseq::{SegmentedSequence, SequenceOptions};

fn main() -> segseq::Result<()> {
    let mut seq = SegmentedSequence::with_options(SequenceOptions::new().with_growth_step(4))?;
    let _log = seq.subscribe_changed(|_, change| {
        println!(
            "{:?} new={:?}@{:?} old={:?}@{:?}",
            change.action, change.new_items, change.new_index, change.old_items, change.old_index
        );
    });

    seq.add_range(1..=6)?;
    println!("segments={:?} capacity={}", seq.segment_capacities(), seq.capacity());

    seq.insert(1, 99)?;
    seq.remove_at(0)?;
    println!("items={:?}", seq.to_vec());

    seq.batch_update(|s| {
        for i in 0..s.len() {
            let v = s.get(i).unwrap_or_default();
            let _ = s.set(i, v * 10);
        }
    });

    seq.compact();
    println!("after compact: segments={:?}", seq.segment_capacities());
    Ok(())
}
