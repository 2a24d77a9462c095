use filter_tree::config::EditorConfig;
use filter_tree::filter::{MatchType, NodeKind};
use filter_tree::model::{
    CellRole, CellValue, EditValue, FilterEditModel, HistoryError, KEY_COLUMN, MATCH_TYPE_COLUMN,
    ModelAction, ModelEvent, NAME_COLUMN, VALUE_COLUMN,
};
use std::cell::RefCell;
use std::rc::Rc;

const DOCUMENT: &str = r#"<FilterTree>
  <Union>
    <Name>people</Name>
    <Match type="Exact"><Name>Bob</Name><Key>Name</Key><Value>Bob</Value></Match>
    <Match type="Wildcard"><Name>A names</Name><Key>Name</Key><Value>A*</Value></Match>
    <Match type="Regex"><Name>Zed</Name><Key>Name</Key><Value>Z.d</Value></Match>
  </Union>
  <Default active="false"><Name>fallback</Name></Default>
</FilterTree>"#;

fn loaded_model() -> FilterEditModel {
    let mut model = FilterEditModel::new();
    model.load_document(DOCUMENT).expect("document should load");
    model
}

fn record_events(model: &mut FilterEditModel) -> Rc<RefCell<Vec<ModelEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    model.subscribe(Box::new(move |event: &ModelEvent| {
        sink.borrow_mut().push(event.clone())
    }));
    events
}

fn text(value: &str) -> CellValue {
    CellValue::Text(value.to_string())
}

#[test]
fn test_grid_navigation() {
    let model = loaded_model();
    assert_eq!(model.column_count(), 4);
    assert_eq!(model.header(MATCH_TYPE_COLUMN), Some("MatchType"));
    assert_eq!(model.header(4), None);

    assert_eq!(model.row_count(None), 2);
    let people = model.child_at(None, 0).unwrap();
    assert_eq!(model.row_count(Some(people)), 3);
    assert_eq!(model.parent_of(people), None);
    assert_eq!(model.row_of(people), Some(0));

    let zed = model.child_at(Some(people), 2).unwrap();
    assert_eq!(model.parent_of(zed), Some(people));
    assert_eq!(model.row_of(zed), Some(2));
    assert_eq!(model.child_at(Some(people), 3), None);
}

#[test]
fn test_cell_values_by_role() {
    let model = loaded_model();
    let people = model.child_at(None, 0).unwrap();
    let a_names = model.child_at(Some(people), 1).unwrap();

    assert_eq!(model.cell_value(a_names, NAME_COLUMN, CellRole::Display), text("A names"));
    assert_eq!(
        model.cell_value(a_names, NAME_COLUMN, CellRole::CheckState),
        CellValue::Checked(true)
    );
    assert_eq!(model.cell_value(a_names, MATCH_TYPE_COLUMN, CellRole::Display), text("Wildcard"));
    assert_eq!(
        model.cell_value(a_names, MATCH_TYPE_COLUMN, CellRole::Edit),
        CellValue::MatchType(MatchType::Wildcard)
    );
    assert_eq!(model.cell_value(a_names, KEY_COLUMN, CellRole::Display), text("Name"));
    assert_eq!(model.cell_value(a_names, VALUE_COLUMN, CellRole::Edit), text("A*"));

    // collections only have a name column
    assert_eq!(model.cell_value(people, KEY_COLUMN, CellRole::Display), CellValue::Empty);
    assert_eq!(model.cell_value(people, NAME_COLUMN, CellRole::Display), text("people"));
}

#[test]
fn test_edit_cell_then_undo_and_redo() {
    let mut model = loaded_model();
    let events = record_events(&mut model);
    let people = model.child_at(None, 0).unwrap();
    let bob = model.child_at(Some(people), 0).unwrap();

    assert!(model.set_cell_value(bob, VALUE_COLUMN, EditValue::Text("Robert".to_string())));
    assert_eq!(model.cell_value(bob, VALUE_COLUMN, CellRole::Display), text("Robert"));
    assert_eq!(model.history().undo_text(), Some("Set value to Robert for Bob"));
    assert!(model.accept(&["Name"], &["Robert"]));

    model.undo().unwrap();
    assert_eq!(model.cell_value(bob, VALUE_COLUMN, CellRole::Display), text("Bob"));
    assert!(model.can_redo());

    model.redo().unwrap();
    assert_eq!(model.cell_value(bob, VALUE_COLUMN, CellRole::Display), text("Robert"));

    let changed = ModelEvent::DataChanged {
        node: bob,
        first_column: VALUE_COLUMN,
        last_column: VALUE_COLUMN,
    };
    assert_eq!(*events.borrow(), vec![changed.clone(), changed.clone(), changed]);
}

#[test]
fn test_match_type_accepts_integer_codes_and_names() {
    let mut model = loaded_model();
    let people = model.child_at(None, 0).unwrap();
    let bob = model.child_at(Some(people), 0).unwrap();

    assert!(model.set_cell_value(bob, MATCH_TYPE_COLUMN, EditValue::Integer(2)));
    assert_eq!(
        model.cell_value(bob, MATCH_TYPE_COLUMN, CellRole::Edit),
        CellValue::MatchType(MatchType::Regex)
    );
    assert!(model.set_cell_value(bob, MATCH_TYPE_COLUMN, EditValue::Text("Wildcard".to_string())));
    assert_eq!(model.cell_value(bob, MATCH_TYPE_COLUMN, CellRole::Display), text("Wildcard"));

    assert!(!model.set_cell_value(bob, MATCH_TYPE_COLUMN, EditValue::Integer(7)));
    assert_eq!(model.history().undo_len(), 2);
}

#[test]
fn test_rejected_edits_leave_no_history() {
    let mut model = loaded_model();
    let people = model.child_at(None, 0).unwrap();

    assert!(!model.set_cell_value(people, KEY_COLUMN, EditValue::Text("Name".to_string())));
    assert!(!model.set_cell_value(people, NAME_COLUMN, EditValue::Integer(1)));
    assert!(!model.can_undo());
}

#[test]
fn test_check_state_disables_filter() {
    let mut model = loaded_model();
    let people = model.child_at(None, 0).unwrap();
    let columns = ["Name"];
    assert!(model.accept(&columns, &["Bob"]));
    assert!(!model.accept(&columns, &["Carol"]));

    assert!(model.set_cell_value(people, NAME_COLUMN, EditValue::Check(false)));
    assert_eq!(
        model.cell_value(people, NAME_COLUMN, CellRole::CheckState),
        CellValue::Checked(false)
    );
    // nothing enabled is left under the root, so every row is rejected
    assert!(!model.accept(&columns, &["Bob"]));

    model.undo().unwrap();
    assert!(model.accept(&columns, &["Bob"]));
}

#[test]
fn test_add_actions_append_defaults_and_notify() {
    let mut model = FilterEditModel::new();
    let events = record_events(&mut model);

    assert!(model.execute_action(ModelAction::AddIntersection, None));
    let group = model.child_at(None, 0).unwrap();
    assert_eq!(model.cell_value(group, NAME_COLUMN, CellRole::Display), text("New Intersection"));

    assert!(model.execute_action(ModelAction::AddMatch, Some(group)));
    let m = model.child_at(Some(group), 0).unwrap();
    assert_eq!(model.cell_value(m, KEY_COLUMN, CellRole::Display), text("foo"));
    assert_eq!(model.cell_value(m, VALUE_COLUMN, CellRole::Display), text("bar"));

    // a Match cannot hold children
    assert!(!model.execute_action(ModelAction::AddUnion, Some(m)));

    assert_eq!(
        *events.borrow(),
        vec![
            ModelEvent::RowsAboutToBeInserted { parent: None, first: 0, last: 0 },
            ModelEvent::RowsInserted { parent: None, first: 0, last: 0 },
            ModelEvent::RowsAboutToBeInserted { parent: Some(group), first: 0, last: 0 },
            ModelEvent::RowsInserted { parent: Some(group), first: 0, last: 0 },
        ]
    );
}

#[test]
fn test_delete_and_undo_restores_subtree() {
    let mut model = loaded_model();
    let people = model.child_at(None, 0).unwrap();
    let zed = model.child_at(Some(people), 2).unwrap();

    assert!(model.execute_action(ModelAction::Delete, Some(people)));
    assert_eq!(model.row_count(None), 1);
    assert_eq!(model.history().undo_text(), Some("Delete people"));
    assert!(model.tree().contains(people));

    model.undo().unwrap();
    assert_eq!(model.child_at(None, 0), Some(people));
    assert_eq!(model.child_at(Some(people), 2), Some(zed));
    assert!(model.accept(&["Name"], &["Zed"]));
}

#[test]
fn test_remove_rows_is_one_undo_step() {
    let mut model = loaded_model();
    let events = record_events(&mut model);
    let people = model.child_at(None, 0).unwrap();
    let zed = model.child_at(Some(people), 2).unwrap();

    assert!(model.remove_rows(Some(people), 0, 2));
    assert_eq!(model.row_count(Some(people)), 1);
    assert_eq!(model.child_at(Some(people), 0), Some(zed));
    assert_eq!(model.history().undo_len(), 1);

    model.undo().unwrap();
    assert_eq!(model.row_count(Some(people)), 3);
    assert_eq!(model.child_at(Some(people), 2), Some(zed));

    assert_eq!(
        *events.borrow(),
        vec![
            ModelEvent::RowsAboutToBeRemoved { parent: Some(people), first: 0, last: 1 },
            ModelEvent::RowsRemoved { parent: Some(people), first: 0, last: 1 },
            ModelEvent::RowsAboutToBeInserted { parent: Some(people), first: 0, last: 1 },
            ModelEvent::RowsInserted { parent: Some(people), first: 0, last: 1 },
        ]
    );
}

#[test]
fn test_remove_rows_rejects_bad_ranges() {
    let mut model = loaded_model();
    let people = model.child_at(None, 0).unwrap();
    let bob = model.child_at(Some(people), 0).unwrap();

    assert!(!model.remove_rows(Some(people), 0, 0));
    assert!(!model.remove_rows(Some(people), 2, 2));
    assert!(!model.remove_rows(Some(people), usize::MAX, 2));
    assert!(!model.remove_rows(Some(bob), 0, 1));
    assert_eq!(model.row_count(Some(people)), 3);
    assert!(!model.can_undo());
}

#[test]
fn test_undo_redo_on_empty_history() {
    let mut model = FilterEditModel::new();
    assert!(matches!(model.undo(), Err(HistoryError::NothingToUndo)));
    assert!(matches!(model.redo(), Err(HistoryError::NothingToRedo)));
}

#[test]
fn test_new_edit_discards_redo() {
    let mut model = FilterEditModel::new();
    let first = model.add_child(None, NodeKind::Union).unwrap();
    model.undo().unwrap();
    assert!(model.can_redo());
    assert!(model.tree().contains(first));

    model.add_child(None, NodeKind::Match).unwrap();
    assert!(!model.can_redo());
    assert!(
        !model.tree().contains(first),
        "an undone insert that can no longer be redone is released"
    );
}

#[test]
fn test_history_limit_releases_deleted_subtree() {
    let config = EditorConfig {
        history_limit: 1,
        ..EditorConfig::default()
    };
    let mut model = FilterEditModel::with_config(&config);
    let doomed = model.add_child(None, NodeKind::Union).unwrap();
    let inner = model.add_child(Some(doomed), NodeKind::Match).unwrap();

    assert!(model.execute_action(ModelAction::Delete, Some(doomed)));
    assert!(model.tree().contains(inner), "deletion is still undoable");

    model.add_child(None, NodeKind::Intersection).unwrap();
    assert_eq!(model.history().undo_len(), 1);
    assert!(!model.tree().contains(doomed));
    assert!(!model.tree().contains(inner));
}

#[test]
fn test_load_resets_history_and_notifies() {
    let mut model = FilterEditModel::new();
    model.add_child(None, NodeKind::Union).unwrap();
    let events = record_events(&mut model);

    model.load_document(DOCUMENT).unwrap();
    assert!(!model.can_undo());
    assert_eq!(*events.borrow(), vec![ModelEvent::ModelReset]);
}

#[test]
fn test_failed_load_keeps_current_tree() {
    let mut model = loaded_model();
    let before = model.to_xml().unwrap();
    let people = model.child_at(None, 0).unwrap();
    assert!(model.set_cell_value(people, NAME_COLUMN, EditValue::Text("folks".to_string())));

    assert!(model.load_document("<Union><Name>broken").is_err());
    assert_ne!(model.to_xml().unwrap(), before);
    assert!(model.can_undo());
    assert_eq!(model.cell_value(people, NAME_COLUMN, CellRole::Display), text("folks"));
}

#[test]
fn test_deleted_filters_cannot_be_edited() {
    let mut model = loaded_model();
    let people = model.child_at(None, 0).unwrap();
    let bob = model.child_at(Some(people), 0).unwrap();
    assert!(model.execute_action(ModelAction::Delete, Some(people)));
    let events = record_events(&mut model);

    assert!(!model.set_cell_value(people, NAME_COLUMN, EditValue::Text("ghost".to_string())));
    assert!(!model.set_cell_value(bob, VALUE_COLUMN, EditValue::Text("ghost".to_string())));
    assert!(!model.execute_action(ModelAction::AddMatch, Some(people)));
    assert!(model.add_child(Some(people), NodeKind::Union).is_err());
    assert!(!model.execute_action(ModelAction::Delete, Some(bob)));
    assert!(!model.remove_rows(Some(people), 0, 1));
    assert!(model.available_actions(Some(people)).is_empty());

    assert!(events.borrow().is_empty());
    assert_eq!(model.history().undo_len(), 1);
    assert_eq!(model.history().undo_text(), Some("Delete people"));

    model.undo().unwrap();
    assert_eq!(model.row_count(Some(people)), 3);
    assert_eq!(model.cell_value(people, NAME_COLUMN, CellRole::Display), text("people"));
    assert_eq!(model.cell_value(bob, VALUE_COLUMN, CellRole::Display), text("Bob"));
}

#[test]
fn test_undo_delete_restores_middle_row() {
    let mut model = loaded_model();
    let people = model.child_at(None, 0).unwrap();
    let bob = model.child_at(Some(people), 0).unwrap();
    let a_names = model.child_at(Some(people), 1).unwrap();
    let zed = model.child_at(Some(people), 2).unwrap();

    assert!(model.execute_action(ModelAction::Delete, Some(a_names)));
    assert_eq!(model.row_count(Some(people)), 2);
    assert_eq!(model.child_at(Some(people), 1), Some(zed));

    model.undo().unwrap();
    assert_eq!(model.row_of(a_names), Some(1));
    assert_eq!(model.parent_of(a_names), Some(people));
    assert_eq!(model.tree().children(people), &[bob, a_names, zed]);
    assert_eq!(model.cell_value(a_names, VALUE_COLUMN, CellRole::Display), text("A*"));

    model.redo().unwrap();
    assert_eq!(model.tree().children(people), &[bob, zed]);
    assert_eq!(model.row_of(a_names), None);
}

#[test]
fn test_undo_delete_restores_row_before_later_siblings() {
    let mut model = loaded_model();
    let people = model.child_at(None, 0).unwrap();
    let fallback = model.child_at(None, 1).unwrap();

    assert!(model.execute_action(ModelAction::AddUnion, None));
    let added = model.child_at(None, 2).unwrap();
    assert!(model.execute_action(ModelAction::Delete, Some(fallback)));
    assert_eq!(model.row_of(added), Some(1));

    model.undo().unwrap();
    assert_eq!(model.tree().children(model.tree().root()), &[people, fallback, added]);
}
