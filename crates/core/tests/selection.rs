mod common;

use leakscope_core::config::{FilterConfig, ViewerConfig};
use leakscope_core::editor::{EditorAnchor, Marker, TextViews, ViewKind};
use leakscope_core::model::{LeakDump, LeakFlag, LeakKey, LeakKind};
use leakscope_core::session::{Selection, Session};

use common::*;

fn function_id(session: &TestSession, library: usize, function: usize) -> u64 {
    session.libs().libraries[library].functions[function].id
}

fn node_id(session: &TestSession, idx: usize) -> u64 {
    session.tree().node(idx).id
}

fn shared_key() -> LeakKey {
    LeakKey::new(LeakKind::Data, SHARED_LEAK)
}

/// The fixture with an extra control-flow leak at `KS_LEAK`, next to the
/// data leak already recorded there.
fn session_with_twin_leaks() -> TestSession {
    let mut root = history();
    let ks = root
        .children
        .get_mut("0")
        .and_then(|main| main.children.get_mut("e"))
        .expect("node e");
    ks.cf_leaks.push(record(KS_LEAK, 0.5, Some(LeakFlag::Investigate)));
    let dump = LeakDump::new(Some(root));
    let config = ViewerConfig::default();
    Session::open(dump, &short_info(), symbols(), TextViews::new(archive()), &config)
        .expect("open")
}

#[test]
fn single_context_leak_resolves_immediately() {
    let mut session = session();
    assert!(session.click_function(function_id(&session, 0, 1)));

    let selection = session.click_leak(data_key(KS_LEAK));
    assert_eq!(
        selection,
        Selection::Resolved { node: KS_NODE, key: LeakKey::new(LeakKind::Data, KS_LEAK) }
    );
    assert_eq!(session.view().selected_node, Some(KS_NODE));
    assert_eq!(session.history().len(), 1);

    let focused = session.editor().focused(ViewKind::Disassembly).expect("asm focus");
    assert_eq!(focused.line, 4);
    assert_eq!(session.editor().focused(ViewKind::Source), None);
}

#[test]
fn multi_context_leak_offers_only_visible_contexts() {
    let mut session = session();
    session.click_function(function_id(&session, 0, 0));

    match session.click_leak(data_key(SHARED_LEAK)) {
        Selection::Ambiguous(choices) => {
            let nodes: Vec<usize> = choices.iter().map(|c| c.node).collect();
            assert_eq!(nodes, vec![ENC_NODE, ENC_VIA_HELPER_C, ENC_VIA_HELPER_D]);
            assert_eq!(choices[1].path, "main/helper/foo_enc");
            assert_eq!(choices[1].flag, LeakFlag::NoLeak);
        }
        other => panic!("expected ambiguous selection, got {other:?}"),
    }

    session.set_filter(LeakFlag::NoLeak, false);
    session.set_filter(LeakFlag::Investigate, false);
    session.click_function(function_id(&session, 0, 0));
    match session.click_leak(data_key(SHARED_LEAK)) {
        Selection::Ambiguous(choices) => {
            assert_eq!(choices.len(), 1);
            assert_eq!(choices[0].node, ENC_NODE);
        }
        other => panic!("expected ambiguous selection, got {other:?}"),
    }

    let resolved = session.choose_context(0);
    assert_eq!(resolved, Selection::Resolved { node: ENC_NODE, key: shared_key() });
    assert!(session.view().context_choices.is_empty());
    assert_eq!(session.view().selected_function.map(|f| f.function), Some(0));

    let current = session.history().current().expect("recorded");
    assert!(current.came_from_call_view);
    assert_eq!(current.context_index, Some(0));
}

#[test]
fn call_view_selection_records_context_position() {
    let mut session = session();
    assert!(session.click_call_node(node_id(&session, ENC_VIA_HELPER_D)));
    let labels: Vec<&str> = session.view().leak_list.iter().map(|i| i.label.as_str()).collect();
    assert_eq!(labels, vec!["DataLeak: 0x110"]);

    let selection = session.click_leak(data_key(SHARED_LEAK));
    assert_eq!(selection, Selection::Resolved { node: ENC_VIA_HELPER_D, key: shared_key() });
    let entry = session.history().current().expect("recorded");
    assert_eq!(entry.context_index, Some(2));
}

#[test]
fn call_node_list_puts_data_leaks_before_control_flow() {
    let mut session = session();
    session.click_call_node(node_id(&session, ENC_NODE));
    let keys: Vec<LeakKind> = session.view().leak_list.iter().map(|i| i.key.kind).collect();
    assert_eq!(keys, vec![LeakKind::Data, LeakKind::ControlFlow]);
    assert_eq!(session.view().leak_list[0].flag, Some(LeakFlag::Leak));
}

#[test]
fn replaying_a_filtered_selection_fails_soft() {
    let mut session = session();
    session.click_call_node(node_id(&session, ENC_VIA_HELPER_C));
    session.click_leak(data_key(SHARED_LEAK));
    let asm_before = session.editor().focused(ViewKind::Disassembly);
    let src_before = session.editor().focused(ViewKind::Source);

    let replay = session.set_filter(LeakFlag::NoLeak, false);
    assert_eq!(replay, Some(Selection::Filtered));
    assert_eq!(session.status(), Some("Selected leak is filtered!"));
    assert_eq!(session.editor().focused(ViewKind::Disassembly), asm_before);
    assert_eq!(session.editor().focused(ViewKind::Source), src_before);
    assert!(!session.collapse_state().has_active_leaks(ENC_VIA_HELPER_C));
    assert!(session.collapse_state().has_active_leaks(HELPER_NODE));

    let restored = session.set_filter(LeakFlag::NoLeak, true);
    assert_eq!(
        restored,
        Some(Selection::Resolved { node: ENC_VIA_HELPER_C, key: shared_key() })
    );
}

#[test]
fn back_and_forward_restore_selections() {
    let mut session = session();
    session.click_function(function_id(&session, 0, 1));
    session.click_leak(data_key(KS_LEAK));
    session.click_call_node(node_id(&session, ENC_NODE));
    session.click_leak(data_key(SHARED_LEAK));
    assert!(session.history().can_go_back());

    let back = session.back().expect("back");
    assert_eq!(
        back,
        Selection::Resolved { node: KS_NODE, key: LeakKey::new(LeakKind::Data, KS_LEAK) }
    );
    assert!(!session.view().came_from_call_view);
    assert_eq!(session.back(), None);

    let forward = session.forward().expect("forward");
    assert_eq!(forward, Selection::Resolved { node: ENC_NODE, key: shared_key() });
    assert!(session.view().came_from_call_view);
    assert_eq!(session.forward(), None);
}

#[test]
fn editor_click_resolves_through_the_owning_function() {
    let mut session = session();
    let anchor = session.index().get(KS_LEAK).and_then(|i| i.asm).expect("anchor");
    let selection = session.click_editor(ViewKind::Disassembly, anchor);
    assert!(matches!(selection, Selection::Resolved { node: KS_NODE, .. }));
    assert_eq!(session.history().len(), 1);
    assert!(!session.history().current().expect("entry").came_from_call_view);

    let shared = session.index().get(SHARED_LEAK).and_then(|i| i.src).expect("anchor");
    assert!(matches!(session.click_editor(ViewKind::Source, shared), Selection::Ambiguous(_)));

    let blank = EditorAnchor { view: anchor.view, line: 0 };
    assert_eq!(session.click_editor(ViewKind::Disassembly, blank), Selection::Invalid);
}

#[test]
fn invalid_clicks_report_status() {
    let mut session = session();
    assert!(!session.click_call_node(u64::MAX));
    assert_eq!(session.status(), Some("Invalid call tree position"));
    assert!(!session.click_function(u64::MAX));
    assert_eq!(session.click_leak(data_key(SHARED_LEAK)), Selection::Invalid);
    assert_eq!(session.choose_context(3), Selection::Invalid);
    assert!(!session.set_flag(LeakFlag::Leak));
    assert!(!session.go_to_caller());
}

#[test]
fn caller_and_callee_jump_through_context_entries() {
    let mut session = session();
    session.click_call_node(node_id(&session, ENC_NODE));
    let callee = session.editor().focused(ViewKind::Disassembly).expect("callee focus");
    assert_eq!(callee.line, 0);
    assert_eq!(session.editor().focused(ViewKind::Source).map(|a| a.line), Some(2));

    assert!(session.go_to_caller());
    assert_eq!(session.editor().focused(ViewKind::Disassembly), None);

    session.click_call_node(node_id(&session, KS_NODE));
    assert!(!session.go_to_caller());
    assert_eq!(session.editor().focused(ViewKind::Disassembly), None);
    assert!(session.status().expect("status").contains("Caller"));
    assert!(session.go_to_callee());
}

#[test]
fn flag_edits_touch_only_the_selected_context() {
    let mut session = session();
    session.click_call_node(node_id(&session, ENC_VIA_HELPER_D));
    session.click_leak(data_key(SHARED_LEAK));

    assert!(session.set_flag(LeakFlag::DontCare));
    assert!(session.set_comment("constant-time in practice"));
    assert!(session.is_dirty());
    assert!(!session.set_flag(LeakFlag::Missing));

    let tree = session.tree();
    let edited = tree.leak(ENC_VIA_HELPER_D, &shared_key()).expect("leak");
    assert_eq!(edited.flag(), LeakFlag::DontCare);
    assert_eq!(edited.comment(), "constant-time in practice");
    assert_eq!(tree.leak(ENC_NODE, &shared_key()).expect("leak").flag(), LeakFlag::Leak);
    assert_eq!(session.view().leak_list[0].flag, Some(LeakFlag::DontCare));

    let anchor = session.index().get(SHARED_LEAK).and_then(|i| i.asm).expect("anchor");
    assert_eq!(session.editor().marker(anchor), Some(Marker::Flag(LeakFlag::DontCare)));
}

#[test]
fn reload_replaces_everything_and_resets_history() {
    let mut session = session();
    session.click_function(function_id(&session, 0, 1));
    session.click_leak(data_key(KS_LEAK));
    let old_root = session.tree().node(0).id;

    session
        .reload(dump(), &short_info(), symbols(), TextViews::new(archive()))
        .expect("reload");
    assert!(session.history().is_empty());
    assert_ne!(session.tree().node(0).id, old_root);
    assert_eq!(session.view().selected_node, None);
    assert_eq!(session.replay_current(), None);

    let mut broken = short_info();
    broken.remove(&MAIN_LEAK);
    let before = session.tree().node(0).id;
    assert!(session.reload(dump(), &broken, symbols(), TextViews::new(archive())).is_err());
    assert_eq!(session.tree().node(0).id, before);
}

#[test]
fn initial_filter_comes_from_config() {
    let config = ViewerConfig {
        filter: FilterConfig { investigate: false, ..FilterConfig::default() },
        history_limit: 1,
        ..ViewerConfig::default()
    };
    let mut session: TestSession =
        Session::open(dump(), &short_info(), symbols(), TextViews::new(archive()), &config)
            .expect("open");
    assert!(!session.filter().is_flag_active(LeakFlag::Investigate));
    assert!(!session.collapse_state().has_active_leaks(KS_NODE));

    session.click_call_node(node_id(&session, MAIN_NODE));
    session.click_leak(data_key(MAIN_LEAK));
    session.click_call_node(node_id(&session, ENC_NODE));
    session.click_leak(data_key(SHARED_LEAK));
    assert_eq!(session.history().len(), 1);
    assert!(!session.history().can_go_back());
}

#[test]
fn leaks_sharing_an_address_are_selected_by_kind() {
    let mut session = session_with_twin_leaks();
    let data = data_key(KS_LEAK);
    let cf = LeakKey::new(LeakKind::ControlFlow, KS_LEAK);
    session.click_function(function_id(&session, 0, 1));
    let keys: Vec<LeakKey> = session.view().leak_list.iter().map(|i| i.key).collect();
    assert_eq!(keys, vec![data, cf]);

    assert_eq!(session.click_leak(cf), Selection::Resolved { node: KS_NODE, key: cf });
    assert_eq!(session.history().current().map(|e| e.key()), Some(cf));
    assert!(session.set_flag(LeakFlag::Leak));
    assert_eq!(session.tree().leak(KS_NODE, &cf).map(|l| l.flag()), Some(LeakFlag::Leak));
    assert_eq!(
        session.tree().leak(KS_NODE, &data).map(|l| l.flag()),
        Some(LeakFlag::Investigate)
    );

    session.click_function(function_id(&session, 0, 1));
    assert_eq!(session.click_leak_row(0), Selection::Resolved { node: KS_NODE, key: data });
    assert_eq!(session.back(), Some(Selection::Resolved { node: KS_NODE, key: cf }));
    assert_eq!(session.view().selected_leak, Some(cf));
    assert_eq!(session.forward(), Some(Selection::Resolved { node: KS_NODE, key: data }));
    assert_eq!(session.click_leak_row(2), Selection::Invalid);
}

#[test]
fn stale_function_list_reports_every_context_filtered() {
    let mut session = session();
    session.click_call_node(node_id(&session, ENC_NODE));
    let asm_before = session.editor().focused(ViewKind::Disassembly);
    let src_before = session.editor().focused(ViewKind::Source);
    assert!(asm_before.is_some());

    session.click_function(function_id(&session, 0, 0));
    for flag in [LeakFlag::Leak, LeakFlag::NoLeak, LeakFlag::Investigate] {
        assert_eq!(session.set_filter(flag, false), None);
    }
    assert!(session.view().leak_list.iter().any(|i| i.key == shared_key()));

    assert_eq!(session.click_leak(shared_key()), Selection::Filtered);
    assert_eq!(session.status(), Some("All call contexts of the selected leak are filtered"));
    assert!(session.view().context_choices.is_empty());
    assert_eq!(session.view().selected_leak, None);
    assert_eq!(session.editor().focused(ViewKind::Disassembly), asm_before);
    assert_eq!(session.editor().focused(ViewKind::Source), src_before);
}

#[test]
fn library_replay_with_every_context_filtered_fails_soft() {
    let mut session = session();
    session.click_call_node(node_id(&session, ENC_NODE));
    let asm_before = session.editor().focused(ViewKind::Disassembly);
    let src_before = session.editor().focused(ViewKind::Source);
    session.click_function(function_id(&session, 0, 0));
    assert!(matches!(session.click_leak(shared_key()), Selection::Ambiguous(_)));
    assert!(!session.history().current().expect("entry").came_from_call_view);

    assert!(matches!(session.set_filter(LeakFlag::Leak, false), Some(Selection::Ambiguous(_))));
    assert!(matches!(
        session.set_filter(LeakFlag::NoLeak, false),
        Some(Selection::Ambiguous(choices)) if choices.len() == 1
    ));
    let replay = session.set_filter(LeakFlag::Investigate, false);
    assert_eq!(replay, Some(Selection::Filtered));
    assert_eq!(session.status(), Some("Selected leak is filtered!"));
    assert!(session.view().leak_list.is_empty());
    assert_eq!(session.editor().focused(ViewKind::Disassembly), asm_before);
    assert_eq!(session.editor().focused(ViewKind::Source), src_before);

    match session.set_filter(LeakFlag::Investigate, true) {
        Some(Selection::Ambiguous(choices)) => {
            let nodes: Vec<usize> = choices.iter().map(|c| c.node).collect();
            assert_eq!(nodes, vec![ENC_VIA_HELPER_D]);
        }
        other => panic!("expected ambiguous selection, got {other:?}"),
    }
}

#[test]
fn filtered_single_context_is_not_selected() {
    let mut session = session();
    session.click_call_node(node_id(&session, ENC_NODE));
    let asm_before = session.editor().focused(ViewKind::Disassembly);
    session.click_function(function_id(&session, 0, 1));
    assert_eq!(session.set_filter(LeakFlag::Investigate, false), None);

    assert_eq!(session.click_leak(data_key(KS_LEAK)), Selection::Filtered);
    assert_eq!(session.status(), Some("Selected leak is filtered!"));
    assert_eq!(session.view().selected_leak, None);
    assert_eq!(session.view().selected_node, None);
    assert_eq!(session.editor().focused(ViewKind::Disassembly), asm_before);
    assert!(!session.set_flag(LeakFlag::Leak));

    let mut session = session_with(&ViewerConfig::default());
    session.click_call_node(node_id(&session, ENC_VIA_HELPER_C));
    assert_eq!(session.set_filter(LeakFlag::NoLeak, false), None);
    assert_eq!(session.click_leak(shared_key()), Selection::Filtered);
    assert_eq!(session.view().selected_leak, None);
}
