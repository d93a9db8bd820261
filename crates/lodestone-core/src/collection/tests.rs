use crate::{
    collection::{CollectionHandle, CollectionSnapshot, Contents, LoadState},
    error::{ErrorClass, ErrorOrigin},
    model::CollectionKind,
    session::{LoadedRow, SessionContext, SessionId},
    test_support::{FakeSession, descriptor, key, one_to_many_descriptor, text},
    value::Value,
};
use proptest::prelude::*;

// ---------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------

#[test]
fn lazy_handle_loads_once_on_first_read() {
    let ctx = FakeSession::new().with_rows(
        &key(),
        vec![LoadedRow::element(text("a")), LoadedRow::element(text("b"))],
    );
    let mut handle = CollectionHandle::new_lazy(key(), CollectionKind::Set);
    handle.set_current_session(&ctx).expect("must attach");
    assert!(!handle.was_initialized());

    handle.read(&ctx).expect("scripted load must succeed");
    assert!(handle.was_initialized());
    assert!(!handle.is_dirty(), "loading does not dirty the handle");

    handle.read(&ctx).expect("second read is a no-op");
    assert_eq!(ctx.loads.get(), 1, "one database round-trip only");
}

#[test]
fn read_without_a_session_is_an_illegal_access() {
    let ctx = FakeSession::new();
    let mut handle = CollectionHandle::new_lazy(key(), CollectionKind::Set);

    let err = handle.read(&ctx).expect_err("detached read must fail");
    assert_eq!(err.class, ErrorClass::IllegalAccess);
    assert!(
        err.message.contains("no session or session was closed"),
        "unexpected error: {err:?}"
    );
    assert!(
        err.message.contains("Parent.children"),
        "error must name the role: {err:?}"
    );
}

#[test]
fn read_on_a_disconnected_session_is_an_illegal_access() {
    let mut ctx = FakeSession::new().register(&key());
    ctx.connected = false;
    let mut handle = CollectionHandle::new_lazy(key(), CollectionKind::Set);
    handle.set_current_session(&ctx).expect("must attach");

    let err = handle.read(&ctx).expect_err("disconnected read must fail");
    assert_eq!(err.class, ErrorClass::IllegalAccess);
    assert!(err.message.contains("disconnected"));
}

#[test]
fn reentrant_load_is_an_illegal_access() {
    let ctx = FakeSession::new().register(&key());
    let mut handle = CollectionHandle::new_lazy(key(), CollectionKind::Set);
    handle.set_current_session(&ctx).expect("must attach");
    handle.begin_read().expect("load must start");

    let err = handle.read(&ctx).expect_err("reentrant read must fail");
    assert_eq!(err.class, ErrorClass::IllegalAccess);
    assert!(err.message.contains("loading"));
}

#[test]
fn failed_load_clears_the_loading_marker_and_keeps_dirty() {
    let ctx = FakeSession::new().with_rows(
        &key(),
        vec![
            LoadedRow::element(text("a")),
            // sequences need an index column
            LoadedRow::element(text("b")),
        ],
    );
    let mut handle = CollectionHandle::new_lazy(key(), CollectionKind::Sequence);
    handle.set_current_session(&ctx).expect("must attach");
    handle.dirty();

    let err = handle.read(&ctx).expect_err("corrupt row must fail the load");
    assert_eq!(err.class, ErrorClass::Corruption);
    assert!(handle.is_dirty(), "dirty flag is left unchanged");
    assert!(!handle.was_initialized());

    // the handle is retryable; fix the rows and read again
    let ctx = FakeSession::new().with_rows(
        &key(),
        vec![LoadedRow::indexed(Value::Int(0), text("a"))],
    );
    handle.set_current_session(&ctx).expect("must re-attach");
    handle.read(&ctx).expect("retry must succeed");
    assert!(handle.was_initialized());
}

#[test]
fn force_initialize_requires_an_attached_session() {
    let ctx = FakeSession::new().register(&key());
    let mut handle = CollectionHandle::new_lazy(key(), CollectionKind::Set);

    let err = handle
        .force_initialize(&ctx)
        .expect_err("detached force must fail");
    assert_eq!(err.class, ErrorClass::IllegalAccess);

    handle.set_current_session(&ctx).expect("must attach");
    handle.force_initialize(&ctx).expect("attached force loads");
    assert!(handle.was_initialized());
}

#[test]
fn attaching_to_a_second_open_session_is_fatal() {
    let first = FakeSession::new().register(&key());
    let mut handle = CollectionHandle::new_lazy(key(), CollectionKind::Set);
    assert!(handle.set_current_session(&first).expect("must attach"));
    assert!(
        !handle.set_current_session(&first).expect("re-attach is a no-op"),
        "same session twice returns false"
    );

    let err = handle
        .set_current_session(&second_session())
        .expect_err("two open sessions must fail");
    assert_eq!(err.class, ErrorClass::InvariantViolation);
    assert!(err.message.contains("two open sessions"));
}

fn second_session() -> FakeSession {
    let mut ctx = FakeSession::new().register(&key());
    ctx.id = SessionId::from(8);
    ctx
}

#[test]
fn detach_then_reattach_crosses_sessions_cleanly() {
    let first = FakeSession::new().register(&key());
    let mut handle = CollectionHandle::new_lazy(key(), CollectionKind::Set);
    handle.set_current_session(&first).expect("must attach");

    assert!(handle.unset_session(first.id()));
    assert!(!handle.unset_session(first.id()), "already detached");

    handle
        .set_current_session(&second_session())
        .expect("detached handle attaches anywhere");
}

// ---------------------------------------------------------------------
// Load protocol
// ---------------------------------------------------------------------

#[test]
fn sequence_rows_land_by_index_with_null_padding() {
    let ctx = FakeSession::new().with_rows(
        &key(),
        vec![
            LoadedRow::indexed(Value::Int(2), text("c")),
            LoadedRow::indexed(Value::Int(0), text("a")),
        ],
    );
    let mut handle = CollectionHandle::new_lazy(key(), CollectionKind::Sequence);
    handle.set_current_session(&ctx).expect("must attach");

    let contents = handle.read(&ctx).expect("scripted load must succeed");
    assert_eq!(
        *contents,
        Contents::Sequence(vec![Some(text("a")), None, Some(text("c"))])
    );
}

#[test]
fn identifier_bag_row_without_an_id_is_corruption() {
    let ctx = FakeSession::new().with_rows(&key(), vec![LoadedRow::element(text("a"))]);
    let mut handle = CollectionHandle::new_lazy(key(), CollectionKind::IdentifierBag);
    handle.set_current_session(&ctx).expect("must attach");

    let err = handle.read(&ctx).expect_err("row without id must fail");
    assert_eq!(err.class, ErrorClass::Corruption);
    assert_eq!(err.origin, ErrorOrigin::Collection);
    assert!(err.message.contains("null identifier column"));
}

// ---------------------------------------------------------------------
// Queued additions
// ---------------------------------------------------------------------

fn inverse_set_session() -> FakeSession {
    FakeSession::new().with_rows(
        &key(),
        vec![LoadedRow::element(text("a")), LoadedRow::element(text("b"))],
    )
}

#[test]
fn inverse_add_queues_without_initializing() {
    let ctx = inverse_set_session();
    let mut d = one_to_many_descriptor(CollectionKind::Set);
    d.is_inverse = true;
    let mut handle = CollectionHandle::new_lazy(key(), CollectionKind::Set);
    handle.set_current_session(&ctx).expect("must attach");

    handle.add(&ctx, &d, text("c")).expect("add must succeed");
    assert!(!handle.was_initialized(), "no load round-trip for the add");
    assert!(handle.is_dirty(), "queued handle must be purged from cache");
    assert_eq!(handle.queued_additions(), &[text("c")]);
    assert_eq!(ctx.loads.get(), 0);
}

#[test]
fn queued_additions_replay_into_the_loaded_base_set() {
    let ctx = inverse_set_session();
    let mut d = one_to_many_descriptor(CollectionKind::Set);
    d.is_inverse = true;
    let mut handle = CollectionHandle::new_lazy(key(), CollectionKind::Set);
    handle.set_current_session(&ctx).expect("must attach");

    // one genuinely new element, one that the base rows already contain
    assert!(handle.queue_add(&ctx, &d, text("c")));
    assert!(handle.queue_add(&ctx, &d, text("b")));

    handle.read(&ctx).expect("scripted load must succeed");
    assert_eq!(
        handle.elements(),
        vec![text("a"), text("b"), text("c")],
        "replay deduplicates against the base rows"
    );
    assert!(!handle.has_queued_additions(), "queue drains on initialize");

    // the snapshot includes replayed elements, so they are not re-inserted
    assert!(handle.equals_snapshot().expect("snapshot captured"));
}

#[test]
fn non_inverse_add_initializes_instead_of_queueing() {
    let ctx = inverse_set_session();
    let d = one_to_many_descriptor(CollectionKind::Set);
    let mut handle = CollectionHandle::new_lazy(key(), CollectionKind::Set);
    handle.set_current_session(&ctx).expect("must attach");

    handle.add(&ctx, &d, text("c")).expect("add must succeed");
    assert!(handle.was_initialized());
    assert_eq!(ctx.loads.get(), 1);
    assert!(handle.is_dirty());
}

#[test]
fn maps_and_orphan_delete_bags_never_queue() {
    let ctx = FakeSession::new().register(&key());

    let mut d = descriptor(CollectionKind::Map);
    d.is_inverse = true;
    let mut map_handle = CollectionHandle::new_lazy(key(), CollectionKind::Map);
    map_handle.set_current_session(&ctx).expect("must attach");
    assert!(!map_handle.queue_add(&ctx, &d, text("v")), "entries need keys");

    let mut d = descriptor(CollectionKind::Bag);
    d.is_inverse = true;
    d.has_orphan_delete = true;
    let mut bag_handle = CollectionHandle::new_lazy(key(), CollectionKind::Bag);
    bag_handle.set_current_session(&ctx).expect("must attach");
    assert!(
        !bag_handle.queue_add(&ctx, &d, text("v")),
        "orphan-delete needs the full contents loaded"
    );
}

#[test]
fn unkeyed_add_to_a_map_is_an_invariant_violation() {
    let ctx = FakeSession::new().register(&key());
    let d = descriptor(CollectionKind::Map);
    let mut handle = CollectionHandle::new_lazy(key(), CollectionKind::Map);
    handle.set_current_session(&ctx).expect("must attach");

    let err = handle
        .add(&ctx, &d, text("v"))
        .expect_err("map entries need a key");
    assert_eq!(err.class, ErrorClass::InvariantViolation);

    assert!(!handle.is_dirty());
    assert!(!handle.was_initialized());
}

// ---------------------------------------------------------------------
// Snapshot semantics
// ---------------------------------------------------------------------

#[test]
fn after_flush_rebases_the_snapshot() {
    let ctx = FakeSession::new().with_rows(&key(), vec![LoadedRow::element(text("a"))]);
    let mut handle = CollectionHandle::new_lazy(key(), CollectionKind::Set);
    handle.set_current_session(&ctx).expect("must attach");
    handle.read(&ctx).expect("scripted load must succeed");

    handle
        .write(&ctx)
        .expect("attached handle must write")
        .add_element(text("b"));
    assert!(!handle.equals_snapshot().expect("snapshot captured"));

    handle.after_flush();
    assert!(!handle.is_dirty());
    assert!(handle.equals_snapshot().expect("snapshot captured"));
}

#[test]
fn wrapped_container_diffs_against_an_empty_baseline() {
    let mut contents = Contents::empty(CollectionKind::Set);
    contents.add_element(text("a"));
    let handle = CollectionHandle::wrap(key(), contents);

    assert!(handle.was_initialized());
    assert!(handle.is_dirty());
    assert!(handle.is_directly_accessible());
    assert_eq!(
        handle.snapshot(),
        Some(&CollectionSnapshot::Set(std::collections::BTreeSet::new()))
    );
}

#[test]
fn replace_contents_rejects_a_kind_change() {
    let mut handle =
        CollectionHandle::wrap(key(), Contents::empty(CollectionKind::Set));
    let err = handle
        .replace_contents(Contents::empty(CollectionKind::Bag))
        .expect_err("kind change must fail");
    assert_eq!(err.class, ErrorClass::InvariantViolation);
}

proptest! {
    /// Bag equality against the snapshot is multiset equality: any
    /// reordering of the same elements reads as unchanged, while adding
    /// any element does not.
    #[test]
    fn bag_snapshot_equality_ignores_order(
        mut elements in proptest::collection::vec(0i64..16, 0..12),
        extra in 0i64..16,
    ) {
        let contents = Contents::Bag(elements.iter().copied().map(Value::Int).collect());
        let snapshot = CollectionSnapshot::capture(&contents);

        elements.reverse();
        let reordered = Contents::Bag(elements.iter().copied().map(Value::Int).collect());
        prop_assert!(snapshot.equals_contents(&reordered));

        elements.push(extra);
        let grown = Contents::Bag(elements.iter().copied().map(Value::Int).collect());
        prop_assert!(!snapshot.equals_contents(&grown));
    }
}

#[test]
fn load_state_transitions_are_single_direction() {
    let mut state = LoadState::Unloaded;
    state.begin_load().expect("unloaded may load");
    assert!(state.is_loading());
    state.finish_load().expect("loading may finish");
    assert!(state.is_initialized());

    let err = state.begin_load().expect_err("initialized never reloads");
    assert_eq!(err.class, ErrorClass::InvariantViolation);
}
