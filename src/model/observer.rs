use crate::filter::NodeId;

/// Change notification sent to views of a [`FilterEditModel`](super::FilterEditModel).
///
/// `parent` is `None` for the root. Structural changes always arrive as an
/// about-to pair followed by the matching done event, with the tree mutated
/// in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    DataChanged {
        node: NodeId,
        first_column: usize,
        last_column: usize,
    },
    RowsAboutToBeInserted {
        parent: Option<NodeId>,
        first: usize,
        last: usize,
    },
    RowsInserted {
        parent: Option<NodeId>,
        first: usize,
        last: usize,
    },
    RowsAboutToBeRemoved {
        parent: Option<NodeId>,
        first: usize,
        last: usize,
    },
    RowsRemoved {
        parent: Option<NodeId>,
        first: usize,
        last: usize,
    },
    ModelReset,
}

pub trait ModelObserver {
    fn on_event(&mut self, event: &ModelEvent);
}

impl<F> ModelObserver for F
where
    F: FnMut(&ModelEvent),
{
    fn on_event(&mut self, event: &ModelEvent) {
        self(event)
    }
}

pub(crate) fn notify_all(observers: &mut [Box<dyn ModelObserver>], event: &ModelEvent) {
    for observer in observers.iter_mut() {
        observer.on_event(event);
    }
}
