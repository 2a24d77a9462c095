use super::command::{Command, Direction, Property, PropertyValue};
use super::history::{History, HistoryError};
use super::observer::{ModelEvent, ModelObserver, notify_all};
use crate::config::{EditorConfig, NewFilterDefaults, default_config};
use crate::filter::{
    FilterError, FilterNode, FilterTree, MatchFilter, MatchType, NodeId, NodeKind,
};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

pub const COLUMN_COUNT: usize = 4;
pub const COLUMN_HEADERS: [&str; COLUMN_COUNT] = ["Name", "MatchType", "Key", "Value"];

pub const NAME_COLUMN: usize = 0;
pub const MATCH_TYPE_COLUMN: usize = 1;
pub const KEY_COLUMN: usize = 2;
pub const VALUE_COLUMN: usize = 3;

/// What a view asks of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellRole {
    Display,
    Edit,
    CheckState,
    Decoration,
}

/// Icon identifying a node's kind in the name column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterIcon {
    Union,
    Intersection,
    Exact,
    Wildcard,
    Regex,
}

impl FilterIcon {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterIcon::Union => "union",
            FilterIcon::Intersection => "intersection",
            FilterIcon::Exact => "exact",
            FilterIcon::Wildcard => "wildcard",
            FilterIcon::Regex => "regex",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Empty,
    Text(String),
    MatchType(MatchType),
    Checked(bool),
    Icon(FilterIcon),
}

/// Value supplied by an editor for [`FilterEditModel::set_cell_value`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditValue {
    Check(bool),
    Text(String),
    MatchType(MatchType),
    Integer(i64),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemFlags {
    pub enabled: bool,
    pub selectable: bool,
    pub checkable: bool,
    pub editable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelAction {
    AddUnion,
    AddIntersection,
    AddMatch,
    Delete,
}

impl ModelAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelAction::AddUnion => "addUnion",
            ModelAction::AddIntersection => "addIntersection",
            ModelAction::AddMatch => "addMatch",
            ModelAction::Delete => "delete",
        }
    }
}

impl fmt::Display for ModelAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown action: '{0}'. Valid actions are: addUnion, addIntersection, addMatch, delete")]
pub struct UnknownAction(pub String);

impl FromStr for ModelAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "addUnion" => Ok(ModelAction::AddUnion),
            "addIntersection" => Ok(ModelAction::AddIntersection),
            "addMatch" => Ok(ModelAction::AddMatch),
            "delete" => Ok(ModelAction::Delete),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// Presents a filter tree as a four-column grid and turns edits into
/// undoable commands.
///
/// Parent handles are `Option<NodeId>` with `None` standing for the root,
/// which is never shown as a row itself.
pub struct FilterEditModel {
    tree: FilterTree,
    history: History,
    observers: Vec<Box<dyn ModelObserver>>,
    root_name: String,
    new_filters: NewFilterDefaults,
}

impl Default for FilterEditModel {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FilterEditModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterEditModel")
            .field("tree", &self.tree)
            .field("history", &self.history)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl FilterEditModel {
    pub fn new() -> Self {
        Self::with_config(default_config())
    }

    pub fn with_config(config: &EditorConfig) -> Self {
        Self {
            tree: FilterTree::new(config.root_name.as_str()),
            history: History::new(config.history_limit),
            observers: Vec::new(),
            root_name: config.root_name.clone(),
            new_filters: config.new_filters.clone(),
        }
    }

    pub fn tree(&self) -> &FilterTree {
        &self.tree
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn subscribe(&mut self, observer: Box<dyn ModelObserver>) {
        self.observers.push(observer);
    }

    fn notify(&mut self, event: ModelEvent) {
        notify_all(&mut self.observers, &event);
    }

    /// Replace the tree with one read from a filter document. On failure
    /// the current tree and history are kept.
    pub fn load_document(&mut self, xml: &str) -> Result<(), FilterError> {
        let tree = FilterTree::from_xml_with_root(xml, &self.root_name)?;
        self.replace_tree(tree);
        Ok(())
    }

    pub fn load_path(&mut self, path: &Path) -> Result<(), FilterError> {
        let tree = FilterTree::from_path(path, &self.root_name)?;
        self.replace_tree(tree);
        Ok(())
    }

    fn replace_tree(&mut self, tree: FilterTree) {
        self.history.clear();
        self.tree = tree;
        self.notify(ModelEvent::ModelReset);
    }

    pub fn to_xml(&self) -> Result<String, FilterError> {
        self.tree.to_xml()
    }

    /// Whether a row passes the root filter
    pub fn accept<C: AsRef<str>, V: AsRef<str>>(&self, columns: &[C], row: &[V]) -> bool {
        self.tree.accept(columns, row)
    }

    fn resolve(&self, parent: Option<NodeId>) -> NodeId {
        parent.unwrap_or_else(|| self.tree.root())
    }

    /// Look up a node shown by the view. Detached nodes only live on for
    /// undo and cannot be edited.
    fn live(&self, id: NodeId) -> Result<&FilterNode, FilterError> {
        if !self.tree.is_attached(id) {
            return Err(FilterError::StaleNode);
        }
        self.tree.get(id)
    }

    pub fn column_count(&self) -> usize {
        COLUMN_COUNT
    }

    pub fn header(&self, column: usize) -> Option<&'static str> {
        COLUMN_HEADERS.get(column).copied()
    }

    pub fn row_count(&self, parent: Option<NodeId>) -> usize {
        self.tree.child_count(self.resolve(parent))
    }

    pub fn child_at(&self, parent: Option<NodeId>, row: usize) -> Option<NodeId> {
        self.tree.child(self.resolve(parent), row)
    }

    /// Parent handle of an attached node; `None` when its parent is the root
    pub fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.tree
            .parent(node)
            .filter(|parent| *parent != self.tree.root())
    }

    pub fn row_of(&self, node: NodeId) -> Option<usize> {
        let parent = self.tree.parent(node)?;
        self.tree.row_of_child(parent, node)
    }

    pub fn cell_value(&self, node: NodeId, column: usize, role: CellRole) -> CellValue {
        let Some(filter) = self.tree.node(node) else {
            return CellValue::Empty;
        };

        if column == NAME_COLUMN {
            return match role {
                CellRole::Display | CellRole::Edit => CellValue::Text(filter.name().to_string()),
                CellRole::CheckState => CellValue::Checked(filter.enabled()),
                CellRole::Decoration => {
                    let icon = match filter.kind().tag() {
                        NodeKind::Union => Some(FilterIcon::Union),
                        NodeKind::Intersection => Some(FilterIcon::Intersection),
                        NodeKind::Match => filter.as_match().map(|m| match m.match_type() {
                            MatchType::Exact => FilterIcon::Exact,
                            MatchType::Wildcard => FilterIcon::Wildcard,
                            MatchType::Regex => FilterIcon::Regex,
                        }),
                        NodeKind::Default => None,
                    };
                    icon.map(CellValue::Icon).unwrap_or(CellValue::Empty)
                }
            };
        }

        let (Some(m), CellRole::Display | CellRole::Edit) = (filter.as_match(), role) else {
            return CellValue::Empty;
        };

        match (column, role) {
            (MATCH_TYPE_COLUMN, CellRole::Edit) => CellValue::MatchType(m.match_type()),
            (MATCH_TYPE_COLUMN, _) => CellValue::Text(m.match_type().to_string()),
            (KEY_COLUMN, _) => CellValue::Text(m.key().to_string()),
            (VALUE_COLUMN, _) => CellValue::Text(m.value().to_string()),
            _ => CellValue::Empty,
        }
    }

    pub fn flags(&self, node: NodeId, column: usize) -> ItemFlags {
        let Some(filter) = self.tree.node(node) else {
            return ItemFlags::default();
        };
        if column >= COLUMN_COUNT {
            return ItemFlags::default();
        }

        ItemFlags {
            enabled: true,
            selectable: true,
            checkable: column == NAME_COLUMN,
            editable: column == NAME_COLUMN || filter.as_match().is_some(),
        }
    }

    fn edit_to_property(
        &self,
        node: NodeId,
        column: usize,
        value: EditValue,
    ) -> Result<(Property, PropertyValue), FilterError> {
        let filter = self.live(node)?;
        let mismatch = || FilterError::TypeMismatch {
            property: format!("column {column}"),
        };

        if column != NAME_COLUMN && filter.as_match().is_none() {
            return Err(mismatch());
        }

        match (column, value) {
            (NAME_COLUMN, EditValue::Check(enabled)) => {
                Ok((Property::Enabled, PropertyValue::Bool(enabled)))
            }
            (NAME_COLUMN, EditValue::Text(name)) => Ok((Property::Name, PropertyValue::Text(name))),
            (MATCH_TYPE_COLUMN, EditValue::MatchType(match_type)) => {
                Ok((Property::MatchType, PropertyValue::MatchType(match_type)))
            }
            (MATCH_TYPE_COLUMN, EditValue::Integer(code)) => MatchType::from_code(code)
                .map(|t| (Property::MatchType, PropertyValue::MatchType(t)))
                .ok_or_else(mismatch),
            (MATCH_TYPE_COLUMN, EditValue::Text(text)) => text
                .parse::<MatchType>()
                .map(|t| (Property::MatchType, PropertyValue::MatchType(t)))
                .map_err(|_| mismatch()),
            (KEY_COLUMN, EditValue::Text(key)) => Ok((Property::Key, PropertyValue::Text(key))),
            (VALUE_COLUMN, EditValue::Text(value)) => {
                Ok((Property::Value, PropertyValue::Text(value)))
            }
            _ => Err(mismatch()),
        }
    }

    /// Edit one cell through an undoable command
    pub fn set_cell_value(&mut self, node: NodeId, column: usize, value: EditValue) -> bool {
        let command = self
            .edit_to_property(node, column, value)
            .and_then(|(property, new)| Command::set_property(&self.tree, node, property, new));

        match command.and_then(|command| self.execute(command)) {
            Ok(()) => true,
            Err(err) => {
                warn!(?node, column, error = %err, "edit rejected");
                false
            }
        }
    }

    pub fn available_actions(&self, node: Option<NodeId>) -> Vec<ModelAction> {
        let target = self.resolve(node);
        let mut actions = Vec::new();
        let Ok(filter) = self.live(target) else {
            return actions;
        };
        if filter.is_combinator() {
            actions.extend([
                ModelAction::AddUnion,
                ModelAction::AddIntersection,
                ModelAction::AddMatch,
            ]);
        }
        if node.is_some() {
            actions.push(ModelAction::Delete);
        }
        actions
    }

    /// Run an action on `node` (`None` is the root, which cannot be deleted)
    pub fn execute_action(&mut self, action: ModelAction, node: Option<NodeId>) -> bool {
        let result = match action {
            ModelAction::Delete => match node {
                Some(node) => self.delete(node),
                None => Err(FilterError::InvalidAttach("the root cannot be deleted".into())),
            },
            ModelAction::AddUnion => self.add_child(node, NodeKind::Union).map(|_| ()),
            ModelAction::AddIntersection => {
                self.add_child(node, NodeKind::Intersection).map(|_| ())
            }
            ModelAction::AddMatch => self.add_child(node, NodeKind::Match).map(|_| ()),
        };

        match result {
            Ok(()) => true,
            Err(err) => {
                warn!(%action, ?node, error = %err, "action failed");
                false
            }
        }
    }

    fn delete(&mut self, node: NodeId) -> Result<(), FilterError> {
        self.live(node)?;
        let parent = self.tree.parent(node).ok_or_else(|| {
            FilterError::InvalidAttach("only attached filters can be deleted".into())
        })?;
        let row = self
            .tree
            .row_of_child(parent, node)
            .ok_or(FilterError::StaleNode)?;
        self.execute(Command::Remove {
            parent,
            row,
            nodes: vec![node],
        })
    }

    /// Append a default-configured child to a combinator
    pub fn add_child(
        &mut self,
        parent: Option<NodeId>,
        kind: NodeKind,
    ) -> Result<NodeId, FilterError> {
        let parent = self.resolve(parent);
        if !self.live(parent)?.is_combinator() {
            return Err(FilterError::NotACombinator);
        }

        let defaults = &self.new_filters;
        let child = match kind {
            NodeKind::Union => self.tree.create_union(defaults.union_name.as_str()),
            NodeKind::Intersection => self
                .tree
                .create_intersection(defaults.intersection_name.as_str()),
            NodeKind::Match => {
                let filter = MatchFilter::new(
                    defaults.match_type,
                    defaults.match_key.as_str(),
                    defaults.match_value.as_str(),
                );
                self.tree.create_match(defaults.match_name.as_str(), filter)
            }
            NodeKind::Default => self.tree.create_default("Default"),
        };

        let row = self.tree.child_count(parent);
        let command = Command::Insert {
            parent,
            row,
            nodes: vec![child],
        };
        if let Err(err) = self.execute(command) {
            if let Err(free_err) = self.tree.free_subtree(child) {
                warn!(?child, error = %free_err, "failed to free unattached filter");
            }
            return Err(err);
        }
        Ok(child)
    }

    /// Remove `count` children of `parent` starting at `start` as one
    /// undoable step
    pub fn remove_rows(&mut self, parent: Option<NodeId>, start: usize, count: usize) -> bool {
        let target = self.resolve(parent);
        match self.live(target) {
            Ok(filter) if filter.is_combinator() => {}
            Ok(_) => {
                warn!(?parent, "cannot remove children from a non-collection filter");
                return false;
            }
            Err(err) => {
                warn!(?parent, error = %err, "cannot remove rows");
                return false;
            }
        }

        let len = self.tree.child_count(target);
        if count == 0 || start.checked_add(count).is_none_or(|end| end > len) {
            warn!(?parent, start, count, len, "row range out of bounds");
            return false;
        }

        let nodes = self.tree.children(target)[start..start + count].to_vec();
        match self.execute(Command::Remove {
            parent: target,
            row: start,
            nodes,
        }) {
            Ok(()) => true,
            Err(err) => {
                warn!(?parent, error = %err, "failed to remove rows");
                false
            }
        }
    }

    fn execute(&mut self, command: Command) -> Result<(), FilterError> {
        let text = command.describe(&self.tree);
        let observers = &mut self.observers;
        command.apply(&mut self.tree, Direction::Forward, &mut |event| {
            notify_all(observers, &event)
        })?;

        debug!(%text, "edit applied");
        let dropped = self.history.push(command, text);
        self.release(dropped);
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> Result<(), HistoryError> {
        let tree = &mut self.tree;
        let observers = &mut self.observers;
        self.history.undo(|command| {
            command.apply(tree, Direction::Backward, &mut |event| {
                notify_all(observers, &event)
            })
        })
    }

    pub fn redo(&mut self) -> Result<(), HistoryError> {
        let tree = &mut self.tree;
        let observers = &mut self.observers;
        self.history.redo(|command| {
            command.apply(tree, Direction::Forward, &mut |event| {
                notify_all(observers, &event)
            })
        })
    }

    pub fn clear_history(&mut self) {
        let dropped = self.history.clear();
        self.release(dropped);
    }

    /// Free detached subtrees that no remaining history entry can bring back
    fn release(&mut self, dropped: Vec<Command>) {
        for command in dropped {
            for node in command.nodes() {
                let detached = self
                    .tree
                    .node(*node)
                    .is_some_and(|n| n.parent().is_none())
                    && *node != self.tree.root();
                if !detached {
                    continue;
                }

                let still_needed = self
                    .history
                    .referenced_nodes()
                    .any(|referenced| self.tree.is_in_subtree(*node, referenced));
                if !still_needed && self.tree.free_subtree(*node).is_ok() {
                    debug!(?node, "released detached filter");
                }
            }
        }
    }
}
