// Copyright 2023 Remi Bernotavicius

diesel::table! {
    slots (name) {
        name -> Text,
        value -> Text,
    }
}
