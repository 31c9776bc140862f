use serde::Serialize;
use serde::de::DeserializeOwned;

use common::AggregateId;
use event_store::SequenceNumber;

/// A domain event as the write model sees it, before type erasure.
///
/// Each aggregate defines one implementing enum. `from_parts` is the single
/// decode point: it returns `Ok(None)` for event types this aggregate does
/// not know, so streams written by newer code replay cleanly on older code.
/// A known type with a malformed payload is an error, never a silent skip.
pub trait GameEvent: Sized + Send + Sync {
    /// Discriminator stored as the event's `event_type` column.
    fn event_type(&self) -> &'static str;

    /// Serializes the business data for storage.
    fn payload(&self) -> Result<serde_json::Value, serde_json::Error>;

    /// Decodes a stored event, or `Ok(None)` if the type is unknown here.
    fn from_parts(
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<Option<Self>, serde_json::Error>;
}

/// An event-sourced aggregate: pure state folded from its event stream.
///
/// State changes only in [`Aggregate::apply`], which must be deterministic
/// and infallible. Command methods live on the concrete type, validate
/// against current state, and return the events to record; they never
/// mutate. The repository owns applying, sequencing, persistence, and
/// snapshots.
///
/// `Serialize`/`DeserializeOwned` cover snapshot state; the serialized form
/// must round-trip the whole aggregate including its sequence.
pub trait Aggregate: Default + Send + Sync + Serialize + DeserializeOwned {
    type Event: GameEvent;

    /// Stream type discriminator, e.g. `"Party"`.
    const AGGREGATE_TYPE: &'static str;

    /// The aggregate's stream id. `None` until a creation event is applied.
    fn id(&self) -> Option<AggregateId>;

    /// Number of events folded into the current state.
    fn sequence(&self) -> SequenceNumber;

    fn set_sequence(&mut self, sequence: SequenceNumber);

    /// Folds one event into the state. Must not fail and must not touch
    /// the sequence; the caller advances it.
    fn apply(&mut self, event: &Self::Event);

    /// Folds a batch of events in order.
    fn apply_all(&mut self, events: &[Self::Event]) {
        for event in events {
            self.apply(event);
        }
    }
}
