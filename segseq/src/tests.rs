use crate::*;

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

#[derive(Clone, Copy, Debug)]
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0
    }

    fn gen_range_usize(&mut self, start: usize, end_exclusive: usize) -> usize {
        debug_assert!(start < end_exclusive);
        let span = (end_exclusive - start) as u64;
        start + (self.next_u64() % span) as usize
    }

    fn gen_i32(&mut self) -> i32 {
        (self.next_u64() >> 33) as i32
    }
}

fn record_changes<T: Clone + Default + PartialEq + 'static>(
    seq: &SegmentedSequence<T>,
) -> (Rc<RefCell<Vec<CollectionChange<T>>>>, Subscription) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let sub = seq.subscribe_changed(move |_, change| sink.borrow_mut().push(change.clone()));
    (log, sub)
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Named {
    name: String,
    value: char,
}

fn named(name: &str, value: char) -> Named {
    Named {
        name: name.into(),
        value,
    }
}

fn named_options() -> SequenceOptions<Named> {
    SequenceOptions::new().with_name_resolver(|item: &Named| Some(item.name.clone()))
}

/// An element that raises its own notifications. Clones share one handler registry.
#[derive(Clone, Debug, Default)]
struct Probe {
    id: u32,
    handlers: Notifier<PropertyChanged>,
}

impl Probe {
    fn new(id: u32) -> Self {
        Self {
            id,
            handlers: Handlers::new(),
        }
    }

    fn touch(&self) {
        self.handlers.notify(&PropertyChanged::new("value"));
    }

    fn observers(&self) -> usize {
        self.handlers.len()
    }
}

impl PartialEq for Probe {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl ObservableItem for Probe {
    fn observe(&self, handler: ItemHandler) -> Subscription {
        self.handlers.insert(handler)
    }
}

#[test]
fn end_to_end_growth_insert_remove() {
    let opts = SequenceOptions::new().with_growth_step(2);
    let mut seq = SegmentedSequence::with_options(opts).unwrap();
    for v in [1, 2, 3] {
        assert!(seq.add(v).unwrap());
    }
    assert_eq!(seq.to_vec(), vec![1, 2, 3]);
    assert_eq!(seq.segment_capacities(), vec![2, 2]);
    assert_eq!(seq.capacity(), 4);

    assert!(seq.insert(1, 99).unwrap());
    assert_eq!(seq.to_vec(), vec![1, 99, 2, 3]);
    assert_eq!(seq.segment_count(), 2);

    assert_eq!(seq.remove_at(0).unwrap(), Some(1));
    assert_eq!(seq.to_vec(), vec![99, 2, 3]);
    assert_eq!(seq.len(), 3);
}

#[test]
fn growth_appends_segments_and_never_moves_existing_ones() {
    for step in [1usize, 2, 3, 5, 16] {
        let opts = SequenceOptions::new().with_growth_step(step);
        let mut seq = SegmentedSequence::with_options(opts).unwrap();
        let mut prev_addrs: Vec<usize> = Vec::new();
        let mut prev_caps: Vec<usize> = Vec::new();

        for n in 1..=40usize {
            seq.add(n as i32).unwrap();
            let expected = step * n.div_ceil(step);
            assert_eq!(seq.capacity(), expected, "step={step} n={n}");

            let addrs = seq.segment_addrs();
            let caps = seq.segment_capacities();
            assert_eq!(&addrs[..prev_addrs.len()], &prev_addrs[..], "step={step} n={n}");
            assert_eq!(&caps[..prev_caps.len()], &prev_caps[..], "step={step} n={n}");
            prev_addrs = addrs;
            prev_caps = caps;
        }
    }
}

#[test]
fn adopted_vec_becomes_first_segment() {
    let items = vec![10, 20, 30];
    let opts = SequenceOptions::new().with_growth_step(4);
    let mut seq = SegmentedSequence::from_vec(items, opts).unwrap();
    assert_eq!(seq.segment_capacities(), vec![3]);
    assert_eq!(seq.capacity(), 3);

    for n in 4..=12usize {
        seq.add(n as i32).unwrap();
        let expected = 3 + 4 * (n - 3).div_ceil(4);
        assert_eq!(seq.capacity(), expected, "n={n}");
    }
    assert!(seq.segment_capacities()[1..].iter().all(|&c| c == 4));
    assert_eq!(seq.get(0).unwrap(), 10);
    assert_eq!(seq.get(3).unwrap(), 4);
}

#[test]
fn property_random_ops_match_vec_model() {
    for step in [1usize, 2, 3, 7] {
        for seed in [1u64, 2, 3, 42, 999] {
            let mut rng = Lcg::new(seed ^ (step as u64) << 8);
            let opts = SequenceOptions::new().with_growth_step(step);
            let mut seq = SegmentedSequence::with_options(opts).unwrap();
            let mut model: Vec<i32> = Vec::new();

            for _ in 0..300 {
                match rng.gen_range_usize(0, 10) {
                    0..=3 => {
                        let index = rng.gen_range_usize(0, model.len() + 1);
                        let value = rng.gen_i32();
                        assert!(seq.insert(index, value).unwrap());
                        model.insert(index, value);
                    }
                    4..=6 if !model.is_empty() => {
                        let index = rng.gen_range_usize(0, model.len());
                        let removed = seq.remove_at(index).unwrap();
                        assert_eq!(removed, Some(model.remove(index)));
                    }
                    7..=8 if !model.is_empty() => {
                        let index = rng.gen_range_usize(0, model.len());
                        let value = rng.gen_i32();
                        let changed = seq.set(index, value).unwrap();
                        assert!(changed);
                        model[index] = value;
                    }
                    _ => {
                        let value = rng.gen_i32();
                        seq.add(value).unwrap();
                        model.push(value);
                    }
                }

                assert_eq!(seq.len(), model.len());
                assert!(seq.len() <= seq.capacity());
                let caps = seq.segment_capacities();
                if caps.len() > 1 {
                    assert!(caps[1..].iter().all(|&c| c == step));
                }
            }

            assert_eq!(seq.to_vec(), model, "step={step} seed={seed}");
            for (i, v) in model.iter().enumerate() {
                assert_eq!(seq.get(i).unwrap(), *v);
            }
        }
    }
}

#[test]
fn remove_resets_vacated_slot_and_compact_shrinks() {
    let opts = SequenceOptions::new().with_growth_step(3);
    let mut seq: SegmentedSequence<i32> = SegmentedSequence::with_options(opts).unwrap();
    seq.add_range(1..=7).unwrap();
    assert_eq!(seq.segment_capacities(), vec![3, 3, 3]);

    seq.remove_at(2).unwrap();
    seq.remove(&6).unwrap();
    assert_eq!(seq.to_vec(), vec![1, 2, 4, 5, 7]);

    let (log, _sub) = record_changes(&seq);
    seq.compact();
    assert_eq!(seq.segment_capacities(), vec![5]);
    assert_eq!(seq.to_vec(), vec![1, 2, 4, 5, 7]);
    assert!(log.borrow().is_empty());

    seq.add(8).unwrap();
    assert_eq!(seq.segment_capacities(), vec![5, 3]);
}

#[test]
fn reset_presizes_first_segment() {
    let mut seq: SegmentedSequence<i32> = (0..20).collect();
    let (log, _sub) = record_changes(&seq);
    assert!(seq.reset(8).unwrap());
    assert!(seq.is_empty());
    assert_eq!(seq.segment_capacities(), vec![8]);
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(log.borrow()[0].action, ChangeAction::Reset);

    seq.add_range(0..8).unwrap();
    assert_eq!(seq.segment_count(), 1);
}

#[test]
fn invalid_construction_arguments_are_rejected() {
    let err = SegmentedSequence::<i32>::with_options(SequenceOptions::new().with_growth_step(0))
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }));

    let err = SegmentedSequence::<i32>::with_capacity(0, SequenceOptions::new()).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }));

    let seq = SegmentedSequence::<i32>::with_capacity(5, SequenceOptions::new()).unwrap();
    assert_eq!(seq.capacity(), 5);
    assert!(seq.is_empty());
}

#[test]
fn set_options_changes_step_for_future_segments() {
    let opts = SequenceOptions::new().with_growth_step(2);
    let mut seq = SegmentedSequence::with_options(opts).unwrap();
    seq.add_range(0..5).unwrap();
    assert_eq!(seq.segment_capacities(), vec![2, 2, 2]);

    seq.update_options(|o| o.growth_step = 10).unwrap();
    assert_eq!(seq.growth_step(), 10);
    assert_eq!(seq.to_vec(), vec![0, 1, 2, 3, 4]);

    seq.add_range(5..7).unwrap();
    let caps = seq.segment_capacities();
    assert!(caps[1..].iter().all(|&c| c == 10));

    assert!(seq.update_options(|o| o.growth_step = 0).is_err());
    assert_eq!(seq.growth_step(), 10);
}

#[test]
fn bounds_errors_and_suppression() {
    let mut seq: SegmentedSequence<i32> = vec![1, 2].into_iter().collect();
    let err = seq.get(5).unwrap_err();
    assert!(err.is_out_of_bounds());
    assert!(matches!(
        err.kind(),
        ErrorKind::IndexOutOfBounds { index: 5, len: 2 }
    ));
    assert!(seq.set(2, 9).unwrap_err().is_out_of_bounds());
    assert!(seq.insert(3, 9).unwrap_err().is_out_of_bounds());
    assert!(seq.remove_at(2).unwrap_err().is_out_of_bounds());
    assert!(seq.move_item(0, 2).unwrap_err().is_out_of_bounds());

    seq.update_options(|o| o.suppress_bounds_errors = true).unwrap();
    let (log, _sub) = record_changes(&seq);
    assert_eq!(seq.get(5).unwrap(), 0);
    assert!(!seq.set(2, 9).unwrap());
    assert!(!seq.insert(3, 9).unwrap());
    assert_eq!(seq.remove_at(2).unwrap(), None);
    assert_eq!(seq.to_vec(), vec![1, 2]);
    assert!(log.borrow().is_empty());
}

#[test]
fn read_only_and_lock_reject_before_side_effects() {
    let mut seq: SegmentedSequence<i32> = (1..=3).collect();
    let changing = Rc::new(Cell::new(0usize));
    let counter = Rc::clone(&changing);
    let _sub = seq.subscribe_changing(move |_| counter.set(counter.get() + 1));

    seq.set_read_only(true);
    assert!(matches!(seq.add(4).unwrap_err().kind(), ErrorKind::ReadOnly));
    assert!(matches!(seq.set(0, 4).unwrap_err().kind(), ErrorKind::ReadOnly));
    assert!(matches!(seq.clear().unwrap_err().kind(), ErrorKind::ReadOnly));
    assert!(matches!(
        seq.assign(vec![9]).unwrap_err().kind(),
        ErrorKind::ReadOnly
    ));
    assert_eq!(seq.to_vec(), vec![1, 2, 3]);
    assert_eq!(changing.get(), 0);

    seq.set_read_only(false);
    seq.lock();
    seq.set_read_only(true);
    // Locked wins over read-only.
    assert!(matches!(seq.remove_at(0).unwrap_err().kind(), ErrorKind::Locked));
    seq.set_read_only(false);
    assert!(matches!(seq.insert(0, 0).unwrap_err().kind(), ErrorKind::Locked));
    assert!(seq.is_locked());
    assert_eq!(seq.to_vec(), vec![1, 2, 3]);
    assert_eq!(changing.get(), 0);
}

#[test]
fn set_item_translator_transforms_or_skips_writes() {
    let opts = SequenceOptions::new()
        .with_set_item_translator(|old: &i32, new: i32| if new < 0 { *old } else { new * 10 });
    let mut seq = SegmentedSequence::from_vec(vec![1, 2, 3], opts).unwrap();
    let (log, _sub) = record_changes(&seq);

    assert!(seq.set(0, 5).unwrap());
    assert_eq!(seq.get(0).unwrap(), 50);

    assert!(!seq.set(1, -1).unwrap());
    assert_eq!(seq.get(1).unwrap(), 2);

    let log = log.borrow();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0], CollectionChange::replaced(1, 50, 0));
}

#[test]
fn changing_and_changed_carry_the_same_payload() {
    let mut seq: SegmentedSequence<i32> = SegmentedSequence::new();
    let before = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&before);
    let _changing = seq.subscribe_changing(move |event| sink.borrow_mut().push(event.change.clone()));
    let (after, _changed) = record_changes(&seq);

    seq.add(1).unwrap();
    seq.add(2).unwrap();
    seq.set(0, 7).unwrap();
    seq.remove_at(1).unwrap();
    seq.insert(0, 3).unwrap();

    let expected = vec![
        CollectionChange::added(1, 0),
        CollectionChange::added(2, 1),
        CollectionChange::replaced(1, 7, 0),
        CollectionChange::removed(2, 1),
        CollectionChange::added(3, 0),
    ];
    assert_eq!(*before.borrow(), expected);
    assert_eq!(*after.borrow(), expected);
}

#[test]
fn changed_handlers_can_read_the_source() {
    let mut seq: SegmentedSequence<i32> = SegmentedSequence::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let _sub = seq.subscribe_changed(move |source, _| {
        let mut items = Vec::new();
        source.for_each_item(&mut |_, v| items.push(*v));
        sink.borrow_mut().push(items);
    });

    seq.add(1).unwrap();
    seq.add(2).unwrap();
    assert_eq!(*seen.borrow(), vec![vec![1], vec![1, 2]]);
}

#[test]
fn veto_leaves_state_untouched() {
    let mut seq: SegmentedSequence<i32> = (1..=3).collect();
    let veto = Rc::new(Cell::new(true));
    let flag = Rc::clone(&veto);
    let _changing = seq.subscribe_changing(move |event| {
        if flag.get() {
            event.cancel();
        }
    });
    let (log, _changed) = record_changes(&seq);

    assert!(!seq.add(4).unwrap());
    assert!(!seq.set(0, 9).unwrap());
    assert_eq!(seq.remove_at(0).unwrap(), None);
    assert!(!seq.move_item(0, 2).unwrap());
    assert!(!seq.clear().unwrap());
    assert!(!seq.assign(vec![5]).unwrap());
    assert_eq!(seq.to_vec(), vec![1, 2, 3]);
    assert!(log.borrow().is_empty());

    veto.set(false);
    assert!(seq.add(4).unwrap());
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn dropping_a_subscription_unsubscribes() {
    let mut seq: SegmentedSequence<i32> = SegmentedSequence::new();
    let (log, sub) = record_changes(&seq);
    assert_eq!(seq.events().changed_handlers(), 1);

    seq.add(1).unwrap();
    drop(sub);
    assert_eq!(seq.events().changed_handlers(), 0);
    seq.add(2).unwrap();
    assert_eq!(log.borrow().len(), 1);

    let (log, sub) = record_changes(&seq);
    sub.unsubscribe();
    seq.add(3).unwrap();
    assert!(log.borrow().is_empty());
}

#[test]
fn handlers_may_subscribe_during_dispatch() {
    let mut seq: SegmentedSequence<i32> = SegmentedSequence::new();
    let events = seq.events().clone();
    let late: Rc<RefCell<Vec<Subscription>>> = Rc::new(RefCell::new(Vec::new()));
    let late_calls = Rc::new(Cell::new(0usize));

    let holder = Rc::clone(&late);
    let calls = Rc::clone(&late_calls);
    let _sub = seq.subscribe_changed(move |_, _| {
        let calls = Rc::clone(&calls);
        let sub = events.subscribe_changed(move |_, _| calls.set(calls.get() + 1));
        holder.borrow_mut().push(sub);
    });

    seq.add(1).unwrap();
    assert_eq!(late_calls.get(), 0);
    seq.add(2).unwrap();
    assert_eq!(late_calls.get(), 1);
}

#[test]
fn batch_update_raises_a_single_reset() {
    let mut seq: SegmentedSequence<i32> = SegmentedSequence::new();
    let changing = Rc::new(Cell::new(0usize));
    let counter = Rc::clone(&changing);
    let _c = seq.subscribe_changing(move |_| counter.set(counter.get() + 1));
    let (log, _sub) = record_changes(&seq);

    seq.batch_update(|s| {
        s.add_range(0..10).unwrap();
        s.remove_at(3).unwrap();
        s.batch_update(|s| {
            s.set(0, 42).unwrap();
        });
    });

    assert_eq!(changing.get(), 0);
    let log = log.borrow();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].action, ChangeAction::Reset);
    assert_eq!(seq.len(), 9);
    assert_eq!(seq.get(0).unwrap(), 42);

    drop(log);
    seq.batch_update(|_| {});
    let (log, _sub) = record_changes(&seq);
    seq.batch_update(|_| {});
    assert!(log.borrow().is_empty());
}

#[test]
fn assign_counts_and_padding() {
    let source = [1, 2, 3, 4, 5];
    let mut seq: SegmentedSequence<i32> = SegmentedSequence::new();
    let (log, _sub) = record_changes(&seq);

    seq.assign_slice(&source, 1, 2).unwrap();
    assert_eq!(seq.to_vec(), vec![2, 3]);

    seq.assign_slice(&source, 3, 4).unwrap();
    assert_eq!(seq.to_vec(), vec![4, 5, 0, 0]);

    seq.assign_slice(&source, 1, -1).unwrap();
    assert_eq!(seq.to_vec(), vec![2, 3, 4]);

    seq.assign_slice(&source, 0, 0).unwrap();
    assert_eq!(seq.to_vec(), vec![1, 2, 3, 4, 5]);

    seq.assign_slice(&source, 9, 2).unwrap();
    assert_eq!(seq.to_vec(), vec![0, 0]);

    seq.assign_iter(source.iter().copied(), 2, -2).unwrap();
    assert_eq!(seq.to_vec(), vec![3]);

    seq.assign(Vec::new()).unwrap();
    assert!(seq.is_empty());

    let log = log.borrow();
    assert_eq!(log.len(), 7);
    assert!(log.iter().all(|c| c.action == ChangeAction::Reset));
}

#[test]
fn move_item_and_swap() {
    let mut seq: SegmentedSequence<char> = "abcde".chars().collect();
    let (log, _sub) = record_changes(&seq);

    assert!(seq.move_item(0, 3).unwrap());
    assert_eq!(seq.to_vec(), vec!['b', 'c', 'd', 'a', 'e']);
    assert_eq!(log.borrow()[0], CollectionChange::moved('a', 0, 3));

    assert!(seq.swap(0, 4).unwrap());
    assert_eq!(seq.to_vec(), vec!['e', 'c', 'd', 'a', 'b']);
    assert_eq!(log.borrow().len(), 3);

    assert_eq!(seq.first().unwrap(), 'e');
    assert_eq!(seq.last().unwrap(), 'b');
    assert_eq!(seq.pop().unwrap(), Some('b'));
    assert!(seq.push('z').unwrap());
    assert_eq!(seq.to_vec(), vec!['e', 'c', 'd', 'a', 'z']);
    assert!(seq.contains(&'d'));
    assert_eq!(seq.index_of(&'a'), Some(3));
}

#[test]
#[should_panic(expected = "empty sequence")]
fn pop_on_empty_panics() {
    let mut seq: SegmentedSequence<i32> = SegmentedSequence::new();
    let _ = seq.pop();
}

#[test]
fn last_on_empty_respects_suppression() {
    let mut seq: SegmentedSequence<i32> = SegmentedSequence::new();
    assert!(seq.last().unwrap_err().is_out_of_bounds());
    seq.update_options(|o| o.suppress_bounds_errors = true).unwrap();
    assert_eq!(seq.last().unwrap(), 0);
}

#[test]
fn set_any_checks_the_type() {
    let mut seq: SegmentedSequence<i32> = (1..=2).collect();
    assert!(seq.set_any(0, Box::new(9i32)).unwrap());
    assert_eq!(seq.get(0).unwrap(), 9);

    let err = seq.set_any(1, Box::new("nine")).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::TypeMismatch { expected } if expected.contains("i32")));
    assert_eq!(seq.get(1).unwrap(), 2);
}

#[test]
fn named_lookup_is_case_insensitive_by_default() {
    let mut seq = SegmentedSequence::with_options(named_options()).unwrap();
    seq.add(named("X", 'a')).unwrap();
    seq.add(named("Y", 'b')).unwrap();
    seq.add(named("Z", 'c')).unwrap();

    assert_eq!(seq.index_of_name("y").unwrap(), Some(1));
    assert_eq!(seq.get_by_name("z").unwrap().map(|n| n.value), Some('c'));
    assert_eq!(
        seq.index_of_name_with("y", NameLookup::new().case_sensitive())
            .unwrap(),
        None
    );
    assert_eq!(seq.index_of_name("w").unwrap(), None);

    let err = seq.add(named("Y", 'd')).unwrap_err();
    match err.into_kind() {
        ErrorKind::DuplicateName { name, message } => {
            assert_eq!(name, "Y");
            assert!(message.contains("'Y'"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(seq.len(), 3);

    let err = seq.add(named("y", 'd')).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::DuplicateName { .. }));
}

#[test]
fn duplicate_names_can_be_permitted_or_silenced() {
    let mut seq = SegmentedSequence::with_options(named_options().with_duplicate_names()).unwrap();
    seq.add(named("X", 'a')).unwrap();
    assert!(seq.add(named("X", 'b')).unwrap());
    assert_eq!(seq.index_of_name("x").unwrap(), Some(0));

    let opts = named_options().with_duplicate_name_message(|_| None);
    let mut seq = SegmentedSequence::with_options(opts).unwrap();
    seq.add(named("X", 'a')).unwrap();
    assert!(seq.add(named("x", 'b')).unwrap());
    assert_eq!(seq.len(), 2);
}

#[test]
fn missing_names_and_resolvers() {
    let plain: SegmentedSequence<i32> = SegmentedSequence::new();
    assert!(matches!(
        plain.index_of_name("a").unwrap_err().kind(),
        ErrorKind::NoNameResolver
    ));

    let mut seq = SegmentedSequence::with_options(named_options()).unwrap();
    seq.add(named("X", 'a')).unwrap();
    let err = seq.get_by_name("nope").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NameNotFound { name, .. } if name == "nope"));

    seq.update_options(|o| {
        o.name_not_found_message = Some(Rc::new(|name: &str| {
            (name != "quiet").then(|| alloc::format!("missing {name}"))
        }))
    })
    .unwrap();
    assert_eq!(seq.get_by_name("quiet").unwrap(), None);
    let err = seq
        .index_of_name_with("loud", NameLookup::new().required())
        .unwrap_err();
    assert_eq!(alloc::format!("{err}"), "missing loud");
}

#[test]
fn string_items_name_themselves() {
    let opts = SequenceOptions::<String>::new().value_names();
    let mut seq = SegmentedSequence::with_options(opts).unwrap();
    seq.add("alpha".into()).unwrap();
    seq.add("Beta".into()).unwrap();
    assert_eq!(seq.index_of_name("BETA").unwrap(), Some(1));
    assert!(seq.add("ALPHA".into()).is_err());
}

#[test]
fn wrapping_a_plain_vec_is_transparent() {
    let backing = Rc::new(RefCell::new(Vec::<i32>::new()));
    let list: SharedList<i32> = backing.clone();
    let mut wrapped = SegmentedSequence::wrapping(list, SequenceOptions::new()).unwrap();
    let mut direct: SegmentedSequence<i32> = SegmentedSequence::new();
    let (log, _sub) = record_changes(&wrapped);

    let mut rng = Lcg::new(7);
    for _ in 0..100 {
        if direct.is_empty() || rng.gen_range_usize(0, 3) > 0 {
            let v = rng.gen_i32();
            wrapped.add(v).unwrap();
            direct.add(v).unwrap();
        } else {
            let index = rng.gen_range_usize(0, direct.len());
            assert_eq!(wrapped.remove_at(index).unwrap(), direct.remove_at(index).unwrap());
        }
        assert_eq!(wrapped.len(), direct.len());
    }
    for i in 0..direct.len() {
        assert_eq!(wrapped.get(i).unwrap(), direct.get(i).unwrap());
    }
    assert_eq!(*backing.borrow(), direct.to_vec());

    assert!(wrapped.is_wrapped());
    assert_eq!(wrapped.segment_count(), 0);
    assert_eq!(log.borrow().len(), 100);

    wrapped.compact();
    assert_eq!(wrapped.to_vec(), direct.to_vec());
}

#[test]
fn wrapping_clears_native_storage_and_detach_returns_the_list() {
    let mut seq: SegmentedSequence<i32> = (1..=4).collect();
    let (log, _sub) = record_changes(&seq);
    let list: SharedList<i32> = Rc::new(RefCell::new(vec![7, 8]));

    assert!(seq.wrap_external(list).unwrap());
    assert_eq!(seq.to_vec(), vec![7, 8]);
    assert_eq!(log.borrow().last().map(|c| c.action), Some(ChangeAction::Reset));

    seq.add(9).unwrap();
    let handle = seq.detach_external().unwrap().unwrap();
    assert!(!seq.is_wrapped());
    assert!(seq.is_empty());
    assert_eq!(handle.borrow().len(), 3);
    assert_eq!(handle.borrow().item(2), Some(9));
    assert_eq!(seq.detach_external().unwrap().map(|_| ()), None);
}

#[test]
fn wrapping_an_observable_list_forwards_its_events() {
    let inner = Rc::new(RefCell::new(SegmentedSequence::<i32>::new()));
    let list: SharedList<i32> = inner.clone();
    let mut outer = SegmentedSequence::wrapping(list, SequenceOptions::new()).unwrap();
    let (log, _sub) = record_changes(&outer);

    outer.add(1).unwrap();
    outer.add(2).unwrap();
    assert_eq!(
        *log.borrow(),
        vec![CollectionChange::added(1, 0), CollectionChange::added(2, 1)]
    );

    inner.borrow_mut().remove_at(0).unwrap();
    assert_eq!(log.borrow().len(), 3);
    assert_eq!(log.borrow()[2], CollectionChange::removed(1, 0));
    assert_eq!(outer.to_vec(), vec![2]);

    // A veto on the wrapper reaches the wrapped list.
    let _veto = outer.subscribe_changing(|event| event.cancel());
    assert!(!outer.add(3).unwrap());
    assert_eq!(inner.borrow().to_vec(), vec![2]);
    assert_eq!(log.borrow().len(), 3);
}

#[test]
fn assign_on_observable_wrapped_list_raises_one_reset() {
    let inner = Rc::new(RefCell::new(SegmentedSequence::<i32>::new()));
    let list: SharedList<i32> = inner.clone();
    let mut outer = SegmentedSequence::wrapping(list, SequenceOptions::new()).unwrap();
    let (log, _sub) = record_changes(&outer);

    outer.assign(vec![1, 2, 3]).unwrap();
    outer.clear().unwrap();
    assert_eq!(log.borrow().len(), 2);
    assert!(log.borrow().iter().all(|c| c.action == ChangeAction::Reset));
}

#[test]
fn item_bridges_attach_exactly_once() {
    let mut seq: SegmentedSequence<Probe> = SegmentedSequence::new();
    let raised = Rc::new(Cell::new(0usize));
    let counter = Rc::clone(&raised);
    let _sub = seq.subscribe_item_changed(move |event| {
        assert_eq!(event.property, "value");
        counter.set(counter.get() + 1);
    });

    let a = Probe::new(1);
    let b = Probe::new(2);
    seq.add(a.clone()).unwrap();
    assert_eq!(a.observers(), 0);

    seq.observe_items();
    seq.observe_items();
    assert_eq!(a.observers(), 1);
    seq.add(b.clone()).unwrap();
    assert_eq!(seq.observed_items(), 2);

    a.touch();
    b.touch();
    assert_eq!(raised.get(), 2);

    let c = Probe::new(3);
    seq.set(0, c.clone()).unwrap();
    assert_eq!(a.observers(), 0);
    assert_eq!(c.observers(), 1);
    a.touch();
    assert_eq!(raised.get(), 2);

    seq.move_item(1, 0).unwrap();
    seq.remove_at(0).unwrap();
    assert_eq!(b.observers(), 0);
    assert_eq!(c.observers(), 1);

    seq.assign(vec![a.clone(), b.clone()]).unwrap();
    assert_eq!((a.observers(), b.observers(), c.observers()), (1, 1, 0));

    seq.clear().unwrap();
    assert_eq!((a.observers(), b.observers()), (0, 0));

    seq.add(a.clone()).unwrap();
    seq.stop_observing_items();
    assert_eq!(a.observers(), 0);
    assert_eq!(seq.observed_items(), 0);
}

#[test]
fn item_bridges_follow_direct_changes_to_a_wrapped_sequence() {
    let inner: Rc<RefCell<SegmentedSequence<Probe>>> =
        Rc::new(RefCell::new(SegmentedSequence::new()));
    let list: SharedList<Probe> = inner.clone();
    let mut outer = SegmentedSequence::wrapping(list, SequenceOptions::new()).unwrap();
    outer.observe_items();
    let raised = Rc::new(Cell::new(0usize));
    let counter = Rc::clone(&raised);
    let _sub = outer.subscribe_item_changed(move |_| counter.set(counter.get() + 1));

    let a = Probe::new(1);
    let b = Probe::new(2);
    outer.add(a.clone()).unwrap();
    assert_eq!(a.observers(), 1);
    inner.borrow_mut().add(b.clone()).unwrap();
    assert_eq!((a.observers(), b.observers()), (1, 1));
    assert_eq!(outer.observed_items(), 2);

    inner.borrow_mut().remove_at(0).unwrap();
    assert_eq!(outer.len(), 1);
    assert_eq!(a.observers(), 0);
    assert_eq!(outer.observed_items(), 1);
    a.touch();
    b.touch();
    assert_eq!(raised.get(), 1);

    let c = Probe::new(3);
    inner.borrow_mut().set(0, c.clone()).unwrap();
    assert_eq!((b.observers(), c.observers()), (0, 1));

    inner.borrow_mut().add(a.clone()).unwrap();
    inner.borrow_mut().move_item(1, 0).unwrap();
    outer.remove_at(0).unwrap();
    assert_eq!((a.observers(), c.observers()), (0, 1));

    inner.borrow_mut().assign(vec![a.clone(), b.clone()]).unwrap();
    assert_eq!((a.observers(), b.observers(), c.observers()), (1, 1, 0));

    inner.borrow_mut().clear().unwrap();
    assert_eq!((a.observers(), b.observers()), (0, 0));
    assert_eq!(outer.observed_items(), 0);
}

#[test]
fn sequence_can_be_driven_through_the_external_list_trait() {
    let mut seq: SegmentedSequence<i32> = SegmentedSequence::new();
    let list: &mut dyn ExternalList<i32> = &mut seq;
    assert!(list.insert_item(0, 1).unwrap());
    assert!(list.insert_item(1, 2).unwrap());
    assert_eq!(list.set_item(0, 5).unwrap(), Some(1));
    assert_eq!(list.remove_item(1).unwrap(), Some(2));
    assert!(list.replace_items(vec![3, 4]).unwrap());
    assert_eq!(list.len(), 2);
    assert!(list.clear_items().unwrap());
    assert!(seq.is_empty());
}
