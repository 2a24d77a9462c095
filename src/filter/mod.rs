//! Filter trees and their document format
//!
//! A filter tree decides whether a row of named fields is shown. Leaves test
//! one column, combinators aggregate their enabled children:
//!
//! ```text
//! Default        accepts every row
//! Match          tests one column (Exact, Wildcard or Regex)
//! Union          any enabled child accepts
//! Intersection   every enabled child accepts
//! ```
//!
//! A disabled node of any kind accepts every row, and combinators ignore
//! their disabled children.
//!
//! # Document format
//!
//! ```text
//! <FilterTree>
//!   <Union active="true">
//!     <Name>Interesting</Name>
//!     <Match type="Wildcard">
//!       <Name>Bobs</Name>
//!       <Key>Name</Key>
//!       <Value>B*b</Value>
//!     </Match>
//!   </Union>
//! </FilterTree>
//! ```
//!
//! A single filter element is also accepted as the document element.

pub mod document;
pub mod error;
pub mod matcher;
pub mod tree;

pub use document::{DOCUMENT_TAG, MAX_NESTING};
pub use error::FilterError;
pub use matcher::{MatchType, Matcher, UnknownMatchType};
pub use tree::{FilterKind, FilterNode, FilterTree, MatchFilter, NodeId, NodeKind};
