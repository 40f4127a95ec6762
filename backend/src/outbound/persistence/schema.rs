//! Diesel table definitions for the speaker request store.
//!
//! Kept in sync by hand with `migrations/`.

diesel::table! {
    speaker_requests (id) {
        id -> Uuid,
        speaker_id -> Uuid,
        event_id -> Uuid,
        organizer_id -> Uuid,
        message -> Nullable<Text>,
        match_score -> Float8,
        rank -> Nullable<Int4>,
        status -> Text,
        responded_at -> Nullable<Timestamptz>,
        rejection_reason -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}
