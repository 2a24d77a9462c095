use super::error::FilterError;
use super::matcher::{MatchType, Matcher};
use tracing::trace;

/// Handle to a node stored in a [`FilterTree`].
///
/// Handles stay valid while the node lives in the arena, including while it
/// is detached. Once the slot is freed the generation no longer matches and
/// every lookup through the old handle fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

/// Kind tag of a filter node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Default,
    Match,
    Union,
    Intersection,
}

impl NodeKind {
    /// Element name used in filter documents
    pub fn tag_name(&self) -> &'static str {
        match self {
            NodeKind::Default => "Default",
            NodeKind::Match => "Match",
            NodeKind::Union => "Union",
            NodeKind::Intersection => "Intersection",
        }
    }

    pub fn from_tag_name(tag: &str) -> Option<Self> {
        match tag {
            "Default" => Some(NodeKind::Default),
            "Match" => Some(NodeKind::Match),
            "Union" => Some(NodeKind::Union),
            "Intersection" => Some(NodeKind::Intersection),
            _ => None,
        }
    }

    pub fn is_combinator(&self) -> bool {
        matches!(self, NodeKind::Union | NodeKind::Intersection)
    }
}

/// Leaf predicate testing one column against a pattern
#[derive(Debug, Clone)]
pub struct MatchFilter {
    match_type: MatchType,
    key: String,
    value: String,
    matcher: Matcher,
}

impl MatchFilter {
    pub fn new(match_type: MatchType, key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        let matcher = Matcher::compile(match_type, &value);
        Self {
            match_type,
            key: key.into(),
            value,
            matcher,
        }
    }

    pub fn match_type(&self) -> MatchType {
        self.match_type
    }

    /// Column name the filter reads
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Pattern the column is tested against
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_match_type(&mut self, match_type: MatchType) {
        self.match_type = match_type;
        self.matcher = Matcher::compile(match_type, &self.value);
    }

    pub fn set_key(&mut self, key: impl Into<String>) {
        self.key = key.into();
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.matcher = Matcher::compile(self.match_type, &self.value);
    }

    /// Test a row. A row without the filter's column does not match.
    pub fn accept<C: AsRef<str>, V: AsRef<str>>(&self, columns: &[C], row: &[V]) -> bool {
        let Some(position) = columns.iter().position(|c| c.as_ref() == self.key) else {
            trace!(key = %self.key, "column not found, row rejected");
            return false;
        };

        match row.get(position) {
            Some(field) => self.matcher.is_match(field.as_ref()),
            None => {
                trace!(key = %self.key, position, "row shorter than column list");
                false
            }
        }
    }
}

impl PartialEq for MatchFilter {
    fn eq(&self, other: &Self) -> bool {
        self.match_type == other.match_type && self.key == other.key && self.value == other.value
    }
}

impl Eq for MatchFilter {}

/// Variant data of a filter node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterKind {
    /// Accepts every row
    Default,
    Match(MatchFilter),
    /// Accepts a row when any enabled child does
    Union(Vec<NodeId>),
    /// Accepts a row when every enabled child does
    Intersection(Vec<NodeId>),
}

impl FilterKind {
    pub fn tag(&self) -> NodeKind {
        match self {
            FilterKind::Default => NodeKind::Default,
            FilterKind::Match(_) => NodeKind::Match,
            FilterKind::Union(_) => NodeKind::Union,
            FilterKind::Intersection(_) => NodeKind::Intersection,
        }
    }

    pub fn is_combinator(&self) -> bool {
        self.tag().is_combinator()
    }

    pub fn as_match(&self) -> Option<&MatchFilter> {
        match self {
            FilterKind::Match(m) => Some(m),
            _ => None,
        }
    }

    /// Children of a combinator; empty for leaves
    pub fn children(&self) -> &[NodeId] {
        match self {
            FilterKind::Union(children) | FilterKind::Intersection(children) => children,
            _ => &[],
        }
    }

    fn children_mut(&mut self) -> Option<&mut Vec<NodeId>> {
        match self {
            FilterKind::Union(children) | FilterKind::Intersection(children) => Some(children),
            _ => None,
        }
    }
}

/// A node of the filter tree
#[derive(Debug, Clone)]
pub struct FilterNode {
    name: String,
    enabled: bool,
    parent: Option<NodeId>,
    kind: FilterKind,
}

impl FilterNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn kind(&self) -> &FilterKind {
        &self.kind
    }

    pub fn is_combinator(&self) -> bool {
        self.kind.is_combinator()
    }

    pub fn as_match(&self) -> Option<&MatchFilter> {
        self.kind.as_match()
    }

    pub fn children(&self) -> &[NodeId] {
        self.kind.children()
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<FilterNode>,
}

/// Arena holding a filter tree rooted at a Union.
///
/// Combinators own their children through ordered id lists; the parent
/// handle of a node is set only when it is attached and cleared when it is
/// detached. Detached subtrees stay in the arena until freed.
#[derive(Debug, Clone)]
pub struct FilterTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
}

impl Default for FilterTree {
    fn default() -> Self {
        Self::new("root")
    }
}

impl FilterTree {
    /// Create a tree holding only an empty root Union
    pub fn new(root_name: impl Into<String>) -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
        };
        tree.root = tree.create_union(root_name);
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes in the arena, the root and detached ones included
    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    /// Whether the root holds any filter
    pub fn has_filters(&self) -> bool {
        self.child_count(self.root) > 0
    }

    pub fn node(&self, id: NodeId) -> Option<&FilterNode> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub fn get(&self, id: NodeId) -> Result<&FilterNode, FilterError> {
        self.node(id).ok_or(FilterError::StaleNode)
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut FilterNode, FilterError> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(FilterError::StaleNode)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    fn alloc(&mut self, name: String, kind: FilterKind) -> NodeId {
        let node = FilterNode {
            name,
            enabled: true,
            parent: None,
            kind,
        };

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    pub fn create_default(&mut self, name: impl Into<String>) -> NodeId {
        self.alloc(name.into(), FilterKind::Default)
    }

    pub fn create_match(&mut self, name: impl Into<String>, filter: MatchFilter) -> NodeId {
        self.alloc(name.into(), FilterKind::Match(filter))
    }

    pub fn create_union(&mut self, name: impl Into<String>) -> NodeId {
        self.alloc(name.into(), FilterKind::Union(Vec::new()))
    }

    pub fn create_intersection(&mut self, name: impl Into<String>) -> NodeId {
        self.alloc(name.into(), FilterKind::Intersection(Vec::new()))
    }

    /// Create a detached node of the given kind with no children
    pub fn create(&mut self, kind: NodeKind, name: impl Into<String>) -> NodeId {
        match kind {
            NodeKind::Default => self.create_default(name),
            NodeKind::Match => self.create_match(name, MatchFilter::new(MatchType::Exact, "", "")),
            NodeKind::Union => self.create_union(name),
            NodeKind::Intersection => self.create_intersection(name),
        }
    }

    pub fn children(&self, parent: NodeId) -> &[NodeId] {
        self.node(parent).map(FilterNode::children).unwrap_or(&[])
    }

    pub fn child(&self, parent: NodeId, index: usize) -> Option<NodeId> {
        self.children(parent).get(index).copied()
    }

    pub fn child_count(&self, parent: NodeId) -> usize {
        self.children(parent).len()
    }

    /// Position of `child` among `parent`'s children
    pub fn row_of_child(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.children(parent).iter().position(|c| *c == child)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(FilterNode::parent)
    }

    /// Whether the node is reachable from the root
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return self.contains(id);
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Whether `id` is `ancestor` or lies below it
    pub fn is_in_subtree(&self, ancestor: NodeId, mut id: NodeId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.parent(id) {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), FilterError> {
        let len = self.child_count(parent);
        self.insert_child(parent, len, child)
    }

    /// Attach a detached node at `index` of `parent`'s children
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<(), FilterError> {
        let child_node = self.get(child)?;
        if child == self.root {
            return Err(FilterError::InvalidAttach("the root has no parent".into()));
        }
        if child_node.parent.is_some() {
            return Err(FilterError::InvalidAttach(format!(
                "'{}' already has a parent",
                child_node.name
            )));
        }
        if self.is_in_subtree(child, parent) {
            return Err(FilterError::InvalidAttach(format!(
                "'{}' would become its own descendant",
                child_node.name
            )));
        }

        let children = self
            .get_mut(parent)?
            .kind
            .children_mut()
            .ok_or(FilterError::NotACombinator)?;
        if index > children.len() {
            return Err(FilterError::OutOfRange {
                index,
                len: children.len(),
            });
        }
        children.insert(index, child);
        self.get_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Detach the child at `index`, keeping its subtree alive in the arena
    pub fn detach_child(&mut self, parent: NodeId, index: usize) -> Result<NodeId, FilterError> {
        let children = self
            .get_mut(parent)?
            .kind
            .children_mut()
            .ok_or(FilterError::NotACombinator)?;
        if index >= children.len() {
            return Err(FilterError::OutOfRange {
                index,
                len: children.len(),
            });
        }
        let child = children.remove(index);
        self.get_mut(child)?.parent = None;
        Ok(child)
    }

    /// Detach the child at `index` and destroy its subtree
    pub fn remove_child(&mut self, parent: NodeId, index: usize) -> Result<(), FilterError> {
        let child = self.detach_child(parent, index)?;
        self.free_subtree(child)
    }

    /// Free a detached subtree
    pub fn free_subtree(&mut self, id: NodeId) -> Result<(), FilterError> {
        let node = self.get(id)?;
        if id == self.root || node.parent.is_some() {
            return Err(FilterError::InvalidAttach(format!(
                "'{}' is still attached",
                node.name
            )));
        }
        self.free_recursive(id);
        Ok(())
    }

    fn free_recursive(&mut self, id: NodeId) {
        let Some(slot) = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
        else {
            return;
        };
        let Some(node) = slot.node.take() else {
            return;
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);

        if let FilterKind::Union(children) | FilterKind::Intersection(children) = node.kind {
            for child in children {
                self.free_recursive(child);
            }
        }
    }

    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) -> Result<(), FilterError> {
        self.get_mut(id)?.name = name.into();
        Ok(())
    }

    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) -> Result<(), FilterError> {
        self.get_mut(id)?.enabled = enabled;
        Ok(())
    }

    /// Mutable access to a Match node's fields
    pub fn match_filter_mut(&mut self, id: NodeId) -> Result<&mut MatchFilter, FilterError> {
        match &mut self.get_mut(id)?.kind {
            FilterKind::Match(m) => Ok(m),
            _ => Err(FilterError::TypeMismatch {
                property: "match".to_string(),
            }),
        }
    }

    /// Evaluate the whole tree against one row
    pub fn accept<C: AsRef<str>, V: AsRef<str>>(&self, columns: &[C], row: &[V]) -> bool {
        self.accept_node(self.root, columns, row)
    }

    /// Evaluate the subtree rooted at `id` against one row
    pub fn accept_node<C: AsRef<str>, V: AsRef<str>>(
        &self,
        id: NodeId,
        columns: &[C],
        row: &[V],
    ) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        if !node.enabled {
            return true;
        }

        match &node.kind {
            FilterKind::Default => true,
            FilterKind::Match(m) => m.accept(columns, row),
            FilterKind::Union(children) => self
                .enabled_children(children)
                .any(|child| self.accept_node(child, columns, row)),
            FilterKind::Intersection(children) => self
                .enabled_children(children)
                .all(|child| self.accept_node(child, columns, row)),
        }
    }

    fn enabled_children<'a>(&'a self, children: &'a [NodeId]) -> impl Iterator<Item = NodeId> + 'a {
        children
            .iter()
            .copied()
            .filter(move |child| self.node(*child).is_some_and(FilterNode::enabled))
    }

    /// Attached nodes below the root in display order, with their depth
    /// (children of the root have depth 0)
    pub fn depth_first(&self) -> Vec<(NodeId, usize)> {
        let mut out = Vec::new();
        let mut stack: Vec<(NodeId, usize)> = self
            .children(self.root)
            .iter()
            .rev()
            .map(|child| (*child, 0))
            .collect();

        while let Some((id, depth)) = stack.pop() {
            out.push((id, depth));
            stack.extend(
                self.children(id)
                    .iter()
                    .rev()
                    .map(|child| (*child, depth + 1)),
            );
        }
        out
    }
}
