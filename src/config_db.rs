use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::{
    config::Settings,
    error::{Error, Result},
};

/// Named linking profiles, stored as settings JSON.
const PROFILES: TableDefinition<&str, &str> = TableDefinition::new("profiles");
const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");

/// Settings key holding the name of the default profile.
pub const DEFAULT_PROFILE_KEY: &str = "default_profile";

pub struct ConfigDb {
    db: Database,
}

impl ConfigDb {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        // Ensure all tables exist by opening them in a write transaction.
        let txn = db.begin_write()?;
        txn.open_table(PROFILES)?;
        txn.open_table(SETTINGS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    // -- Profiles --

    /// Store a profile. The settings are validated first.
    pub fn set_profile(&self, name: &str, settings: &Settings) -> Result<()> {
        settings.validate()?;
        let json = serde_json::to_string(settings)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(PROFILES)?;
            table.insert(name, json.as_str())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_profile(&self, name: &str) -> Result<Option<Settings>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(PROFILES)?;
        table
            .get(name)?
            .map(|v| Settings::from_json(v.value()))
            .transpose()
    }

    /// Remove a profile, clearing the default if it pointed to it.
    pub fn remove_profile(&self, name: &str) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(PROFILES)?;
            table.remove(name)?.is_some()
        };
        {
            let mut settings = txn.open_table(SETTINGS)?;
            let is_default = settings
                .get(DEFAULT_PROFILE_KEY)?
                .is_some_and(|v| v.value() == name);
            if is_default {
                settings.remove(DEFAULT_PROFILE_KEY)?;
            }
        }
        txn.commit()?;
        Ok(removed)
    }

    pub fn list_profiles(&self) -> Result<Vec<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(PROFILES)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, _v) = entry?;
            result.push(k.value().to_string());
        }
        Ok(result)
    }

    pub fn set_default_profile(&self, name: &str) -> Result<()> {
        if self.get_profile(name)?.is_none() {
            return Err(Error::NotFound {
                kind: "profile",
                name: name.to_string(),
            });
        }
        self.set_setting(DEFAULT_PROFILE_KEY, name)
    }

    pub fn default_profile(&self) -> Result<Option<String>> {
        self.get_setting(DEFAULT_PROFILE_KEY)
    }

    /// The settings of `name`, or of the default profile when `name` is
    /// `None`, or the built-in defaults when no default profile is set.
    pub fn resolve_settings(&self, name: Option<&str>) -> Result<Settings> {
        let name = match name {
            Some(n) => Some(n.to_string()),
            None => self.default_profile()?,
        };
        match name {
            Some(n) => self.get_profile(&n)?.ok_or(Error::NotFound {
                kind: "profile",
                name: n,
            }),
            None => Ok(Settings::default()),
        }
    }

    // -- Settings --

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }
}

impl std::fmt::Debug for ConfigDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigDb").finish_non_exhaustive()
    }
}
