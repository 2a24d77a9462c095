//! Editing model for filter trees
//!
//! [`FilterEditModel`] exposes a [`FilterTree`](crate::filter::FilterTree) to
//! tree views as rows of four columns (name, match type, key, value). Every
//! edit goes through a [`Command`] recorded in the [`History`], and views
//! follow along through [`ModelEvent`] notifications.

pub mod command;
pub mod edit_model;
pub mod history;
pub mod observer;

pub use command::{Command, Direction, Property, PropertyChange, PropertyValue};
pub use edit_model::{
    COLUMN_COUNT, COLUMN_HEADERS, CellRole, CellValue, EditValue, FilterEditModel, FilterIcon,
    ItemFlags, KEY_COLUMN, MATCH_TYPE_COLUMN, ModelAction, NAME_COLUMN, UnknownAction,
    VALUE_COLUMN,
};
pub use history::{History, HistoryError};
pub use observer::{ModelEvent, ModelObserver};
