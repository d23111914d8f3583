use std::cell::RefCell;
use std::rc::Rc;

use segseq::SegmentedSequence;
use segseq_view::FilteredView;

fn main() -> segseq::Result<()> {
    let source = Rc::new(RefCell::new((1..=10).collect::<SegmentedSequence<i32>>()));
    let view: FilteredView<i32> = FilteredView::new(Rc::clone(&source));

    let _current = view.subscribe_current_changed(|event| {
        println!("current: {:?} -> {:?}", event.previous, event.position);
    });

    view.batch_update(|v| {
        v.set_filter(|x: &i32| x % 2 == 0);
        v.add_filter(|x: &i32| *x > 2);
    });
    println!("view={:?} generation={}", view.to_vec(), view.generation());

    view.move_to(Some(&6))?;
    source.borrow_mut().remove_at(0)?;
    println!("after removing 1: current={:?} index={}", view.current(), view.current_index());

    source.borrow_mut().remove(&6)?;
    println!("after removing 6: current={:?} index={}", view.current(), view.current_index());

    while view.move_next()? {
        if view.current().is_none() {
            break;
        }
        println!("  at {:?}", view.current());
    }
    Ok(())
}
