table! {
    delivery_records (id) {
        id -> Uuid,
        feed_id -> Uuid,
        status -> Text,
        error_code -> Nullable<Text>,
        internal_message -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

table! {
    failure_records (url) {
        url -> Text,
        reason -> Nullable<Text>,
        failed_at -> Timestamptz,
        alerted -> Bool,
    }
}

table! {
    feed_connections (id) {
        id -> Uuid,
        feed_id -> Uuid,
        kind -> Text,
        name -> Text,
        filters -> Nullable<Jsonb>,
        channel_id -> Nullable<Text>,
        webhook_id -> Nullable<Text>,
        webhook_token -> Nullable<Text>,
        webhook_name -> Nullable<Text>,
        webhook_icon_url -> Nullable<Text>,
        content -> Nullable<Text>,
        embeds -> Jsonb,
        formatter -> Jsonb,
        created_at -> Timestamptz,
    }
}

table! {
    feeds (id) {
        id -> Uuid,
        guild_id -> Text,
        title -> Text,
        url -> Text,
        channel_id -> Text,
        text -> Nullable<Text>,
        webhook_id -> Nullable<Text>,
        webhook_name -> Nullable<Text>,
        webhook_avatar -> Nullable<Text>,
        refresh_rate_seconds -> Nullable<Int4>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

joinable!(feed_connections -> feeds (feed_id));

allow_tables_to_appear_in_same_query!(delivery_records, failure_records, feed_connections, feeds,);
