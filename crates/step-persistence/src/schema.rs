// Diesel schema shared by the SQLite and Postgres backends.
// Tablas: outcomes (ledger de pasos), accounts, transfer_log
use diesel::allow_tables_to_appear_in_same_query;
diesel::table! {
    outcomes (namespace, workflow_id, step_index) {
        namespace -> Text,
        workflow_id -> Text,
        step_index -> Integer,
        output -> Nullable<Text>,
        error -> Nullable<Text>,
    }
}
diesel::table! {
    accounts (id) {
        id -> BigInt,
        name -> Text,
        balance -> BigInt,
    }
}
diesel::table! {
    transfer_log (id) {
        id -> BigInt,
        from_account -> BigInt,
        to_account -> BigInt,
        amount -> BigInt,
        status -> Text,
        error_message -> Nullable<Text>,
        created_at -> Timestamp,
    }
}
allow_tables_to_appear_in_same_query!(accounts, transfer_log);
