table! {
    articles (id) {
        id -> Integer,
        slug -> Text,
        title -> Text,
        description -> Text,
        body -> Text,
        tag_list -> Text,
        favorites_count -> BigInt,
        author_id -> Integer,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    article_comments (article_id, comment_id) {
        article_id -> Integer,
        comment_id -> Integer,
    }
}

table! {
    favorites (user_id, article_id) {
        user_id -> Integer,
        article_id -> Integer,
    }
}

table! {
    followers (user_id, followed_id) {
        user_id -> Integer,
        followed_id -> Integer,
    }
}

table! {
    users (id) {
        id -> Integer,
        username -> Text,
        email -> Text,
        bio -> Nullable<Text>,
        image -> Nullable<Text>,
        password_salt -> Text,
        password_hash -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

joinable!(articles -> users (author_id));
joinable!(article_comments -> articles (article_id));
joinable!(favorites -> articles (article_id));

allow_tables_to_appear_in_same_query!(articles, article_comments, favorites, followers, users);
