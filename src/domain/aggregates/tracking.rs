//! Tracking Timeline
//!
//! Shipment events for one order. The origin anchor (location `Quibble`)
//! is always first, the destination anchor (location `Customer`) is always
//! last, and everything between is ordered by timestamp with pending
//! (untimestamped) events at the end. The order is re-derived on every
//! write, whatever order the caller proposed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

pub const ORIGIN_LOCATION: &str = "Quibble";
pub const DESTINATION_LOCATION: &str = "Customer";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEvent {
    pub id: Uuid,
    pub timestamp: Option<DateTime<Utc>>,
    pub location: String,
    pub status: String,
    pub description: String,
}

impl TrackingEvent {
    pub fn is_origin(&self) -> bool { self.location == ORIGIN_LOCATION }
    pub fn is_destination(&self) -> bool { self.location == DESTINATION_LOCATION }
    pub fn is_anchor(&self) -> bool { self.is_origin() || self.is_destination() }
}

/// Caller-supplied fields for a new or edited event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEventDraft {
    pub timestamp: Option<DateTime<Utc>>,
    pub location: String,
    pub status: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackingError {
    #[error("tracking event {0} not found")]
    EventNotFound(Uuid),
    #[error("anchor event {0} cannot be moved, relocated or removed")]
    AnchorImmovable(Uuid),
    #[error("location '{0}' is reserved for anchor events")]
    ReservedLocation(String),
    #[error("proposed ordering must list every event exactly once")]
    InvalidOrdering,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingTimeline {
    tracking_number: Option<String>,
    events: Vec<TrackingEvent>,
}

impl TrackingTimeline {
    /// Opens a timeline with both anchors; the destination stays pending until delivery.
    pub fn start(tracking_number: Option<String>, dispatched_at: DateTime<Utc>) -> Self {
        let origin = TrackingEvent {
            id: Uuid::new_v4(),
            timestamp: Some(dispatched_at),
            location: ORIGIN_LOCATION.to_string(),
            status: "Dispatched".to_string(),
            description: "Package left the Quibble warehouse".to_string(),
        };
        let destination = TrackingEvent {
            id: Uuid::new_v4(),
            timestamp: None,
            location: DESTINATION_LOCATION.to_string(),
            status: "Awaiting delivery".to_string(),
            description: "Package has not reached the customer yet".to_string(),
        };
        Self { tracking_number, events: vec![origin, destination] }
    }

    pub fn tracking_number(&self) -> Option<&str> { self.tracking_number.as_deref() }
    pub fn events(&self) -> &[TrackingEvent] { &self.events }
    pub fn latest_status(&self) -> Option<&str> {
        self.events.iter().filter(|e| e.timestamp.is_some()).max_by_key(|e| e.timestamp).map(|e| e.status.as_str())
    }

    pub fn set_tracking_number(&mut self, tracking_number: impl Into<String>) { self.tracking_number = Some(tracking_number.into()); }

    pub fn add(&mut self, draft: TrackingEventDraft) -> Result<Uuid, TrackingError> {
        reject_reserved(&draft.location)?;
        let id = Uuid::new_v4();
        self.events.push(TrackingEvent { id, timestamp: draft.timestamp, location: draft.location, status: draft.status, description: draft.description });
        self.canonicalize();
        Ok(id)
    }

    pub fn edit(&mut self, id: Uuid, draft: TrackingEventDraft) -> Result<(), TrackingError> {
        let event = self.events.iter_mut().find(|e| e.id == id).ok_or(TrackingError::EventNotFound(id))?;
        if event.is_anchor() {
            if draft.location != event.location { return Err(TrackingError::AnchorImmovable(id)); }
        } else {
            reject_reserved(&draft.location)?;
        }
        event.timestamp = draft.timestamp;
        event.location = draft.location;
        event.status = draft.status;
        event.description = draft.description;
        self.canonicalize();
        Ok(())
    }

    pub fn remove(&mut self, id: Uuid) -> Result<(), TrackingError> {
        let idx = self.events.iter().position(|e| e.id == id).ok_or(TrackingError::EventNotFound(id))?;
        if self.events[idx].is_anchor() { return Err(TrackingError::AnchorImmovable(id)); }
        self.events.remove(idx);
        Ok(())
    }

    /// Accepts a proposed ordering, rejecting one that displaces an anchor,
    /// then persists the canonical order regardless of the proposal.
    pub fn reorder(&mut self, proposed: &[Uuid]) -> Result<(), TrackingError> {
        let known: HashSet<Uuid> = self.events.iter().map(|e| e.id).collect();
        let listed: HashSet<Uuid> = proposed.iter().copied().collect();
        if proposed.len() != self.events.len() || listed != known { return Err(TrackingError::InvalidOrdering); }

        if let Some(origin) = self.events.iter().find(|e| e.is_origin()) {
            if proposed.first() != Some(&origin.id) { return Err(TrackingError::AnchorImmovable(origin.id)); }
        }
        if let Some(destination) = self.events.iter().find(|e| e.is_destination()) {
            if proposed.last() != Some(&destination.id) { return Err(TrackingError::AnchorImmovable(destination.id)); }
        }
        self.canonicalize();
        Ok(())
    }

    /// Stamps the destination anchor once the parcel is handed over.
    pub fn mark_delivered(&mut self, at: DateTime<Utc>) {
        if let Some(destination) = self.events.iter_mut().find(|e| e.is_destination()) {
            destination.timestamp = Some(at);
            destination.status = "Delivered".to_string();
            destination.description = "Package delivered to the customer".to_string();
        }
        self.canonicalize();
    }

    fn canonicalize(&mut self) {
        self.events = canonical_order(std::mem::take(&mut self.events));
    }
}

fn reject_reserved(location: &str) -> Result<(), TrackingError> {
    if location == ORIGIN_LOCATION || location == DESTINATION_LOCATION {
        return Err(TrackingError::ReservedLocation(location.to_string()));
    }
    Ok(())
}

/// Origin first, destination last, the rest by ascending timestamp.
pub fn canonical_order(events: Vec<TrackingEvent>) -> Vec<TrackingEvent> {
    let (mut origin, mut destination, mut middle) = (Vec::new(), Vec::new(), Vec::new());
    for event in events {
        if event.is_origin() { origin.push(event) }
        else if event.is_destination() { destination.push(event) }
        else { middle.push(event) }
    }
    // None sorts before Some, so pending events are keyed to the end explicitly.
    middle.sort_by_key(|e| (e.timestamp.is_none(), e.timestamp));
    origin.into_iter().chain(middle).chain(destination).collect()
}
