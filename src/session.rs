// Copyright 2023 Remi Bernotavicius

use crate::database;
use crate::repository::Repository;

/// The repository together with the store it was loaded from. The in-memory repository stays
/// authoritative when the store cannot be read or written.
pub struct Session {
    conn: database::Connection,
    pub repository: Repository,
}

/// Returns `None` when stored data exists but could not be read. The raw document is copied to
/// `database::UNREADABLE_SLOT` in that case.
fn load(conn: &mut database::Connection) -> Option<Repository> {
    let error = match database::load_document(conn) {
        Ok(None) => return Some(Repository::new()),
        Ok(Some(doc)) => match Repository::from_document(doc) {
            Ok(repository) => return Some(repository),
            Err(error) => database::StorageError::from(error),
        },
        Err(error) => error,
    };
    log::warn!("saved data could not be read, starting empty: {error}");
    match database::set_aside_document(conn) {
        Ok(()) => log::warn!(
            "unreadable data kept in slot {:?}",
            database::UNREADABLE_SLOT
        ),
        Err(error) => log::warn!("failed to keep a copy of unreadable data: {error}"),
    }
    None
}

impl Session {
    pub fn open(mut conn: database::Connection) -> Self {
        let loaded = load(&mut conn);
        let readable = loaded.is_some();
        let mut session = Self {
            conn,
            repository: loaded.unwrap_or_default(),
        };
        if session.repository.seed_samples_if_empty() {
            log::info!("added sample ingredients, packaging and nutrition facts");
            // Stored data is only replaced once the user changes something.
            if readable {
                session.save();
            }
        }
        session
    }

    /// Writes the repository to the store, returning whether it succeeded.
    pub fn save(&mut self) -> bool {
        let result = self
            .repository
            .to_document()
            .map_err(database::StorageError::from)
            .and_then(|doc| database::save_document(&mut self.conn, &doc));
        match result {
            Ok(()) => true,
            Err(error) => {
                log::warn!("failed to save data: {error}");
                false
            }
        }
    }

    #[cfg(test)]
    fn into_connection(self) -> database::Connection {
        self.conn
    }
}

#[cfg(test)]
use crate::repository::{EntityKind, PackagingInput, ValidationError};

#[test]
fn first_open_seeds_and_saves() {
    let session = Session::open(database::in_memory());
    assert_eq!(session.repository.len(EntityKind::Ingredients), 5);

    let mut conn = session.into_connection();
    let doc = database::load_document(&mut conn).unwrap().unwrap();
    assert_eq!(doc["ingredients"].as_array().unwrap().len(), 5);
    assert_eq!(doc["nutrition"][0]["ingredient"], "麵粉");
}

#[test]
fn saved_changes_survive_reopen() {
    let mut session = Session::open(database::in_memory());
    session
        .repository
        .add_packaging(PackagingInput {
            name: "麵包袋".into(),
            category: Some("袋子".into()),
            cost: 1.5,
            note: None,
        })
        .unwrap();
    assert!(session.save());
    let before = session.repository.clone();

    let session = Session::open(session.into_connection());
    assert_eq!(session.repository, before);
}

#[test]
fn unreadable_data_starts_fresh_without_overwriting() {
    let mut conn = database::in_memory();
    database::save_slot(&mut conn, database::DOCUMENT_SLOT, "[1, 2").unwrap();
    let session = Session::open(conn);
    assert_eq!(session.repository.len(EntityKind::Packaging), 3);

    let mut conn = session.into_connection();
    for slot in [database::DOCUMENT_SLOT, database::UNREADABLE_SLOT] {
        assert_eq!(
            database::load_slot(&mut conn, slot).unwrap().as_deref(),
            Some("[1, 2")
        );
    }
}

#[test]
fn one_bad_entity_does_not_lose_stored_data() {
    let stored = serde_json::json!({
        "ingredients": [
            { "id": 1, "name": "麵粉", "unit": "公斤", "price": 35 },
            { "name": "no id", "unit": "公斤", "price": 10 }
        ],
        "recipes": [{
            "id": 1, "name": "海綿蛋糕", "servings": 6,
            "ingredients": [{ "ingredientId": 1, "amount": 500 }]
        }],
        "products": [{ "id": 1, "name": "6吋海綿蛋糕", "sellingPrice": 380 }]
    });
    let mut conn = database::in_memory();
    database::save_document(&mut conn, &stored).unwrap();

    let mut session = Session::open(conn);
    assert_eq!(session.repository.len(EntityKind::Recipes), 0);
    assert_eq!(session.repository.len(EntityKind::Ingredients), 5);

    let conn = &mut session.conn;
    assert_eq!(database::load_document(conn).unwrap(), Some(stored.clone()));
    let kept = database::load_slot(conn, database::UNREADABLE_SLOT)
        .unwrap()
        .unwrap();
    assert_eq!(serde_json::from_str::<serde_json::Value>(&kept).unwrap(), stored);

    assert!(session.save());
    let mut conn = session.into_connection();
    assert!(database::load_slot(&mut conn, database::UNREADABLE_SLOT)
        .unwrap()
        .is_some());
}

#[test]
fn failed_edit_writes_nothing() {
    use clap::Parser as _;

    #[derive(clap::Parser)]
    struct Cli {
        #[command(subcommand)]
        entity: crate::entry::Entity,
    }

    let mut session = Session::open(database::in_memory());
    let before = database::load_slot(&mut session.conn, database::DOCUMENT_SLOT).unwrap();

    let cli = Cli::try_parse_from(["test", "recipe", "--name", "海綿蛋糕", "--line", "99:500"])
        .unwrap();
    assert_eq!(
        crate::entry::apply(&mut session.repository, None, cli.entity),
        Err(ValidationError::NoIngredientLines)
    );

    let after = database::load_slot(&mut session.conn, database::DOCUMENT_SLOT).unwrap();
    assert_eq!(after, before);
    assert_eq!(session.repository.len(EntityKind::Recipes), 0);
}
