//! Change notifications
//!
//! Callers wrap analysis results in notifications that can be merged, so a
//! burst of updates of one kind is delivered as a single notification.

use serde::{Deserialize, Serialize};

/// Kind of model change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelUpdateType {
    Added,
    Updated,
    Deleted,
}

/// Notification kinds; notifications only combine with their own kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "update")]
pub enum NotificationKind {
    HistoryUpdated,
    UpdateAnalysisData,
    ModelUpdated(ModelUpdateType),
    SummaryUpdated,
}

/// Type of a changed object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    InhaleEvent,
    Device,
    Medication,
    Prescription,
    Summary,
}

/// Reference to an object touched by a change
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangedObject {
    pub kind: ObjectKind,
    pub id: String,
}

impl ChangedObject {
    pub fn new(kind: ObjectKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub kind: NotificationKind,
    #[serde(default)]
    pub objects_changed: Vec<ChangedObject>,
}

impl ChangeNotification {
    pub fn new(kind: NotificationKind, objects_changed: Vec<ChangedObject>) -> Self {
        Self { kind, objects_changed }
    }

    /// Merge `other` into this notification.
    ///
    /// Returns false, leaving both untouched, when the kinds differ.
    pub fn combine_with(&mut self, other: &ChangeNotification) -> bool {
        if self.kind != other.kind {
            return false;
        }
        self.objects_changed.extend(other.objects_changed.iter().cloned());
        true
    }

    pub fn contains_objects_of_kind(&self, kind: ObjectKind) -> bool {
        self.objects_changed.iter().any(|o| o.kind == kind)
    }

    pub fn contains(&self, object: &ChangedObject) -> bool {
        self.objects_changed.contains(object)
    }
}

/// Group notifications by kind, concatenating their changed objects.
///
/// Output order follows the first appearance of each kind.
pub fn combine(notifications: Vec<ChangeNotification>) -> Vec<ChangeNotification> {
    notifications
        .into_iter()
        .fold(Vec::new(), |mut combined: Vec<ChangeNotification>, notification| {
            match combined.iter_mut().find(|n| n.kind == notification.kind) {
                Some(existing) => existing.objects_changed.extend(notification.objects_changed),
                None => combined.push(notification),
            }
            combined
        })
}

/// Notifications waiting to be delivered
#[derive(Debug, Clone, Default)]
pub struct PendingNotifications {
    pending: Vec<ChangeNotification>,
}

impl PendingNotifications {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a notification, folding it into a pending one of the same kind
    pub fn post(&mut self, notification: ChangeNotification) {
        if !self.pending.iter_mut().any(|n| n.combine_with(&notification)) {
            self.pending.push(notification);
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take every pending notification
    pub fn drain(&mut self) -> Vec<ChangeNotification> {
        std::mem::take(&mut self.pending)
    }
}
