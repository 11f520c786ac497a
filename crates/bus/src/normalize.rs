use relive_core::{Payload, RawNotification, ReloadEvent};

/// Extract the reloaded subject from a raw notification.
///
/// A collection contributes only its first element. Payloads with nothing
/// usable yield an empty event, which matches no candidate.
pub fn normalize(notification: &RawNotification) -> ReloadEvent {
    match &notification.payload {
        Payload::Instance(subject) => ReloadEvent::for_subject(subject.clone()),
        Payload::Collection(subjects) => subjects
            .first()
            .cloned()
            .map(ReloadEvent::for_subject)
            .unwrap_or_default(),
        Payload::Class(class) => ReloadEvent::for_class(class.clone()),
        Payload::Empty => ReloadEvent::empty(),
    }
}
