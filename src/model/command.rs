use super::observer::ModelEvent;
use crate::filter::{FilterError, FilterTree, MatchType, NodeId};
use std::fmt;

/// Editable property of a filter node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    Name,
    Enabled,
    MatchType,
    Key,
    Value,
}

impl Property {
    pub fn as_str(&self) -> &'static str {
        match self {
            Property::Name => "name",
            Property::Enabled => "enabled",
            Property::MatchType => "type",
            Property::Key => "key",
            Property::Value => "value",
        }
    }

    /// Grid column showing the property
    pub fn column(&self) -> usize {
        match self {
            Property::Name | Property::Enabled => 0,
            Property::MatchType => 1,
            Property::Key => 2,
            Property::Value => 3,
        }
    }

    fn is_match_only(&self) -> bool {
        matches!(self, Property::MatchType | Property::Key | Property::Value)
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Text(String),
    Bool(bool),
    MatchType(MatchType),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Text(text) => f.write_str(text),
            PropertyValue::Bool(value) => write!(f, "{value}"),
            PropertyValue::MatchType(match_type) => write!(f, "{match_type}"),
        }
    }
}

/// Old and new value of one property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyChange {
    pub property: Property,
    pub old: PropertyValue,
    pub new: PropertyValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Do or redo
    Forward,
    /// Undo
    Backward,
}

/// A single reversible edit of a filter tree.
///
/// Structural commands cover a contiguous run of rows starting at `row`.
/// The nodes of a `Remove` stay detached in the arena while the command is
/// in the history, so undo reattaches the very same subtrees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetProperty {
        target: NodeId,
        change: PropertyChange,
    },
    Insert {
        parent: NodeId,
        row: usize,
        nodes: Vec<NodeId>,
    },
    Remove {
        parent: NodeId,
        row: usize,
        nodes: Vec<NodeId>,
    },
}

pub fn read_property(
    tree: &FilterTree,
    id: NodeId,
    property: Property,
) -> Result<PropertyValue, FilterError> {
    let node = tree.get(id)?;
    if property.is_match_only() {
        let m = node.as_match().ok_or_else(|| FilterError::TypeMismatch {
            property: property.to_string(),
        })?;
        return Ok(match property {
            Property::MatchType => PropertyValue::MatchType(m.match_type()),
            Property::Key => PropertyValue::Text(m.key().to_string()),
            _ => PropertyValue::Text(m.value().to_string()),
        });
    }

    Ok(match property {
        Property::Enabled => PropertyValue::Bool(node.enabled()),
        _ => PropertyValue::Text(node.name().to_string()),
    })
}

pub fn write_property(
    tree: &mut FilterTree,
    id: NodeId,
    property: Property,
    value: &PropertyValue,
) -> Result<(), FilterError> {
    match (property, value) {
        (Property::Name, PropertyValue::Text(name)) => tree.set_name(id, name.as_str()),
        (Property::Enabled, PropertyValue::Bool(enabled)) => tree.set_enabled(id, *enabled),
        (Property::MatchType, PropertyValue::MatchType(match_type)) => {
            tree.match_filter_mut(id)?.set_match_type(*match_type);
            Ok(())
        }
        (Property::Key, PropertyValue::Text(key)) => {
            tree.match_filter_mut(id)?.set_key(key.as_str());
            Ok(())
        }
        (Property::Value, PropertyValue::Text(value)) => {
            tree.match_filter_mut(id)?.set_value(value.as_str());
            Ok(())
        }
        _ => Err(FilterError::TypeMismatch {
            property: property.to_string(),
        }),
    }
}

fn view_parent(tree: &FilterTree, parent: NodeId) -> Option<NodeId> {
    (parent != tree.root()).then_some(parent)
}

fn attach_rows(
    tree: &mut FilterTree,
    parent: NodeId,
    row: usize,
    nodes: &[NodeId],
    notify: &mut dyn FnMut(ModelEvent),
) -> Result<(), FilterError> {
    let len = tree.child_count(parent);
    if row > len {
        return Err(FilterError::OutOfRange { index: row, len });
    }
    if let Some(attached) = nodes.iter().find(|id| tree.parent(**id).is_some()) {
        return Err(FilterError::InvalidAttach(format!(
            "node {attached:?} is already attached"
        )));
    }

    let view = view_parent(tree, parent);
    let last = row + nodes.len() - 1;
    notify(ModelEvent::RowsAboutToBeInserted {
        parent: view,
        first: row,
        last,
    });
    for (offset, id) in nodes.iter().enumerate() {
        tree.insert_child(parent, row + offset, *id)?;
    }
    notify(ModelEvent::RowsInserted {
        parent: view,
        first: row,
        last,
    });
    Ok(())
}

fn detach_rows(
    tree: &mut FilterTree,
    parent: NodeId,
    row: usize,
    nodes: &[NodeId],
    notify: &mut dyn FnMut(ModelEvent),
) -> Result<(), FilterError> {
    let children = tree.children(parent);
    let in_place = children
        .get(row..row + nodes.len())
        .is_some_and(|run| run == nodes);
    if !in_place {
        return Err(FilterError::StaleNode);
    }

    let view = view_parent(tree, parent);
    let last = row + nodes.len() - 1;
    notify(ModelEvent::RowsAboutToBeRemoved {
        parent: view,
        first: row,
        last,
    });
    for _ in nodes {
        tree.detach_child(parent, row)?;
    }
    notify(ModelEvent::RowsRemoved {
        parent: view,
        first: row,
        last,
    });
    Ok(())
}

impl Command {
    /// Record a property change, reading the current value as the old one
    pub fn set_property(
        tree: &FilterTree,
        target: NodeId,
        property: Property,
        new: PropertyValue,
    ) -> Result<Self, FilterError> {
        let old = read_property(tree, target, property)?;
        Ok(Command::SetProperty {
            target,
            change: PropertyChange { property, old, new },
        })
    }

    /// Apply the command to `tree`, reporting view notifications to `notify`
    pub fn apply(
        &self,
        tree: &mut FilterTree,
        direction: Direction,
        notify: &mut dyn FnMut(ModelEvent),
    ) -> Result<(), FilterError> {
        match self {
            Command::SetProperty { target, change } => {
                let value = match direction {
                    Direction::Forward => &change.new,
                    Direction::Backward => &change.old,
                };
                write_property(tree, *target, change.property, value)?;
                let column = change.property.column();
                notify(ModelEvent::DataChanged {
                    node: *target,
                    first_column: column,
                    last_column: column,
                });
                Ok(())
            }
            Command::Insert { nodes, .. } | Command::Remove { nodes, .. } if nodes.is_empty() => {
                Ok(())
            }
            Command::Insert { parent, row, nodes } => match direction {
                Direction::Forward => attach_rows(tree, *parent, *row, nodes, notify),
                Direction::Backward => detach_rows(tree, *parent, *row, nodes, notify),
            },
            Command::Remove { parent, row, nodes } => match direction {
                Direction::Forward => detach_rows(tree, *parent, *row, nodes, notify),
                Direction::Backward => attach_rows(tree, *parent, *row, nodes, notify),
            },
        }
    }

    /// Every node the command refers to
    pub fn nodes(&self) -> &[NodeId] {
        match self {
            Command::SetProperty { target, .. } => std::slice::from_ref(target),
            Command::Insert { nodes, .. } | Command::Remove { nodes, .. } => nodes,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        match self {
            Command::SetProperty { .. } => None,
            Command::Insert { parent, .. } | Command::Remove { parent, .. } => Some(*parent),
        }
    }

    /// Text shown in undo menus, e.g. `Set key to Name for Match 1`
    pub fn describe(&self, tree: &FilterTree) -> String {
        let name_of = |id: &NodeId| {
            tree.node(*id)
                .map(|node| node.name().to_string())
                .unwrap_or_default()
        };

        match self {
            Command::SetProperty { target, change } => format!(
                "Set {} to {} for {}",
                change.property,
                change.new,
                name_of(target)
            ),
            Command::Insert { nodes, .. } if nodes.len() == 1 => {
                format!("Add {}", name_of(&nodes[0]))
            }
            Command::Insert { nodes, .. } => format!("Add {} filters", nodes.len()),
            Command::Remove { nodes, .. } if nodes.len() == 1 => {
                format!("Delete {}", name_of(&nodes[0]))
            }
            Command::Remove { nodes, .. } => format!("Delete {} filters", nodes.len()),
        }
    }
}
