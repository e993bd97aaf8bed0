//! Diesel table definition for the generic document store.

diesel::table! {
    documents (collection, id) {
        collection -> Text,
        id -> Text,
        body -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}
