//! Campaign and resource registry backed by a SQLite file in the project
//! directory.
//!
//! Concurrent writers registering the same resource name are not supported;
//! campaign creation itself is safe through `INSERT OR IGNORE`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use preagg_core::context::ProjectContext;
use preagg_core::errors::{ErrorInfo, PreaggError};
use preagg_core::seed::BatchKey;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS campaigns (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    batch INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS resources (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    path TEXT NOT NULL,
    UNIQUE (name, path)
);
CREATE TABLE IF NOT EXISTS campaign_resources (
    campaign_id INTEGER NOT NULL REFERENCES campaigns(id),
    resource_id INTEGER NOT NULL REFERENCES resources(id),
    position INTEGER NOT NULL,
    PRIMARY KEY (campaign_id, resource_id)
);
"#;

/// Ordered collection of sample resources for one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    /// Registry row id.
    pub id: i64,
    /// Campaign name, `c{batch}`.
    pub name: String,
    /// Batch the campaign belongs to.
    pub batch: BatchKey,
    /// Creation timestamp.
    pub created_at: String,
}

/// Registered sample resource package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Registry row id.
    pub id: i64,
    /// Resource name.
    pub name: String,
    /// Package directory.
    pub path: PathBuf,
}

/// Handle on the registry database.
#[derive(Debug)]
pub struct ResourceRegistry {
    conn: Connection,
    path: PathBuf,
}

fn sqlite_error(code: &str, message: &str, err: rusqlite::Error) -> PreaggError {
    PreaggError::Registry(ErrorInfo::new(code, message).with_hint(err.to_string()))
}

impl ResourceRegistry {
    /// Opens (creating when needed) the registry at `path`.
    pub fn open(path: &Path) -> Result<Self, PreaggError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                PreaggError::Registry(
                    ErrorInfo::new("registry-create", "failed to create registry directory")
                        .with_path(parent)
                        .with_hint(err.to_string()),
                )
            })?;
        }
        let conn = Connection::open(path).map_err(|err| {
            PreaggError::Registry(
                ErrorInfo::new("registry-sqlite-open", "failed to open sqlite registry")
                    .with_path(path)
                    .with_hint(err.to_string()),
            )
        })?;
        conn.execute_batch(SCHEMA).map_err(|err| {
            sqlite_error("registry-sqlite-schema", "failed to ensure registry schema", err)
        })?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Opens the registry of the project named by `ctx`.
    pub fn open_in(ctx: &ProjectContext) -> Result<Self, PreaggError> {
        Self::open(&ctx.registry_path())
    }

    /// Location of the registry file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the campaign of `batch`, creating an empty one unless
    /// `require_existing` is set.
    pub fn get_or_create_campaign(
        &mut self,
        batch: BatchKey,
        require_existing: bool,
    ) -> Result<Campaign, PreaggError> {
        if let Some(campaign) = self.find_campaign(batch)? {
            return Ok(campaign);
        }
        if require_existing {
            return Err(PreaggError::Registry(
                ErrorInfo::new("campaign-missing", "No base campaign generated yet")
                    .with_context("campaign", batch.campaign_name())
                    .with_hint("run base-resources first"),
            ));
        }
        let tx = self.conn.transaction().map_err(|err| {
            sqlite_error("registry-sqlite-transaction", "failed to start transaction", err)
        })?;
        tx.execute(
            "INSERT OR IGNORE INTO campaigns (name, batch, created_at) VALUES (?1, ?2, ?3)",
            params![
                batch.campaign_name(),
                i64::from(batch.get()),
                Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
            ],
        )
        .map_err(|err| sqlite_error("registry-sqlite-insert", "failed to create campaign", err))?;
        tx.commit().map_err(|err| {
            sqlite_error("registry-sqlite-commit", "failed to commit campaign", err)
        })?;
        info!(campaign = %batch.campaign_name(), "created campaign");
        self.find_campaign(batch)?.ok_or_else(|| {
            PreaggError::Registry(
                ErrorInfo::new("campaign-lost", "campaign vanished after creation")
                    .with_context("campaign", batch.campaign_name()),
            )
        })
    }

    /// Campaign of `batch`, when it exists.
    pub fn find_campaign(&self, batch: BatchKey) -> Result<Option<Campaign>, PreaggError> {
        self.conn
            .query_row(
                "SELECT id, name, batch, created_at FROM campaigns WHERE name = ?1",
                params![batch.campaign_name()],
                campaign_from_row,
            )
            .optional()
            .map_err(|err| sqlite_error("registry-sqlite-query", "failed to look up campaign", err))
    }

    /// Every campaign, ordered by batch.
    pub fn list_campaigns(&self) -> Result<Vec<Campaign>, PreaggError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, batch, created_at FROM campaigns ORDER BY batch")
            .map_err(|err| sqlite_error("registry-sqlite-prepare", "failed to prepare query", err))?;
        let rows = stmt
            .query_map([], campaign_from_row)
            .map_err(|err| sqlite_error("registry-sqlite-query", "failed to list campaigns", err))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|err| sqlite_error("registry-sqlite-row", "failed to read campaign", err))
    }

    /// Registers a resource; registering the same `(name, path)` again returns
    /// the existing row.
    pub fn register_resource(&mut self, name: &str, path: &Path) -> Result<Resource, PreaggError> {
        let path_text = path.to_string_lossy().into_owned();
        let tx = self.conn.transaction().map_err(|err| {
            sqlite_error("registry-sqlite-transaction", "failed to start transaction", err)
        })?;
        tx.execute(
            "INSERT OR IGNORE INTO resources (name, path) VALUES (?1, ?2)",
            params![name, path_text],
        )
        .map_err(|err| sqlite_error("registry-sqlite-insert", "failed to register resource", err))?;
        let resource = tx
            .query_row(
                "SELECT id, name, path FROM resources WHERE name = ?1 AND path = ?2",
                params![name, path_text],
                resource_from_row,
            )
            .map_err(|err| sqlite_error("registry-sqlite-query", "failed to read resource", err))?;
        tx.commit().map_err(|err| {
            sqlite_error("registry-sqlite-commit", "failed to commit resource", err)
        })?;
        debug!(resource = name, id = resource.id, "registered resource");
        Ok(resource)
    }

    /// True when `resource` belongs to `campaign`.
    pub fn contains(&self, campaign: &Campaign, resource: &Resource) -> Result<bool, PreaggError> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM campaign_resources WHERE campaign_id = ?1 AND resource_id = ?2",
                params![campaign.id, resource.id],
                |row| row.get(0),
            )
            .map_err(|err| sqlite_error("registry-sqlite-query", "failed to check membership", err))?;
        Ok(count > 0)
    }

    /// Appends `resource` to `campaign`. Returns false when it was already a
    /// member.
    pub fn attach(&mut self, campaign: &Campaign, resource: &Resource) -> Result<bool, PreaggError> {
        let tx = self.conn.transaction().map_err(|err| {
            sqlite_error("registry-sqlite-transaction", "failed to start transaction", err)
        })?;
        let next_position: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(position) + 1, 0) FROM campaign_resources WHERE campaign_id = ?1",
                params![campaign.id],
                |row| row.get(0),
            )
            .map_err(|err| sqlite_error("registry-sqlite-query", "failed to read positions", err))?;
        let inserted = tx
            .execute(
                "INSERT OR IGNORE INTO campaign_resources (campaign_id, resource_id, position)
                 VALUES (?1, ?2, ?3)",
                params![campaign.id, resource.id, next_position],
            )
            .map_err(|err| sqlite_error("registry-sqlite-insert", "failed to attach resource", err))?;
        tx.commit().map_err(|err| {
            sqlite_error("registry-sqlite-commit", "failed to commit membership", err)
        })?;
        if inserted > 0 {
            info!(campaign = %campaign.name, resource = %resource.name, "attached resource");
        } else {
            debug!(campaign = %campaign.name, resource = %resource.name, "resource already attached");
        }
        Ok(inserted > 0)
    }

    /// Resources of `campaign` in attachment order.
    pub fn campaign_resources(&self, campaign: &Campaign) -> Result<Vec<Resource>, PreaggError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT r.id, r.name, r.path FROM resources r
                 JOIN campaign_resources cr ON cr.resource_id = r.id
                 WHERE cr.campaign_id = ?1 ORDER BY cr.position",
            )
            .map_err(|err| sqlite_error("registry-sqlite-prepare", "failed to prepare query", err))?;
        let rows = stmt
            .query_map(params![campaign.id], resource_from_row)
            .map_err(|err| sqlite_error("registry-sqlite-query", "failed to list resources", err))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|err| sqlite_error("registry-sqlite-row", "failed to read resource", err))
    }

    /// Every registered resource, by id.
    pub fn list_resources(&self) -> Result<Vec<Resource>, PreaggError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, path FROM resources ORDER BY id")
            .map_err(|err| sqlite_error("registry-sqlite-prepare", "failed to prepare query", err))?;
        let rows = stmt
            .query_map([], resource_from_row)
            .map_err(|err| sqlite_error("registry-sqlite-query", "failed to list resources", err))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|err| sqlite_error("registry-sqlite-row", "failed to read resource", err))
    }

    /// Points every resource at `new_parent/<package dir>` when its parent
    /// differs. Returns the number of rewritten rows.
    pub fn relocate_resources(&mut self, new_parent: &Path) -> Result<usize, PreaggError> {
        let resources = self.list_resources()?;
        let tx = self.conn.transaction().map_err(|err| {
            sqlite_error("registry-sqlite-transaction", "failed to start transaction", err)
        })?;
        let mut rewritten = 0;
        for resource in resources {
            if resource.path.parent() == Some(new_parent) {
                continue;
            }
            let Some(dir_name) = package_dir_name(&resource.path) else {
                continue;
            };
            let relocated = new_parent.join(dir_name);
            tx.execute(
                "UPDATE resources SET path = ?1 WHERE id = ?2",
                params![relocated.to_string_lossy().into_owned(), resource.id],
            )
            .map_err(|err| {
                sqlite_error("registry-sqlite-update", "failed to relocate resource", err)
            })?;
            debug!(resource = %resource.name, from = %resource.path.display(), to = %relocated.display(), "relocated resource");
            rewritten += 1;
        }
        tx.commit().map_err(|err| {
            sqlite_error("registry-sqlite-commit", "failed to commit relocation", err)
        })?;
        info!(rewritten, parent = %new_parent.display(), "relocated resources");
        Ok(rewritten)
    }
}

/// Last component of a stored path, accepting either separator so paths
/// registered on another platform can be relocated.
fn package_dir_name(path: &Path) -> Option<String> {
    path.to_string_lossy()
        .rsplit(['/', '\\'])
        .find(|part| !part.is_empty())
        .map(str::to_string)
}

fn campaign_from_row(row: &Row<'_>) -> rusqlite::Result<Campaign> {
    let raw_batch: i64 = row.get(2)?;
    let batch = u32::try_from(raw_batch)
        .ok()
        .and_then(|raw| BatchKey::new(raw).ok())
        .ok_or_else(|| {
            rusqlite::Error::IntegralValueOutOfRange(2, raw_batch)
        })?;
    Ok(Campaign {
        id: row.get(0)?,
        name: row.get(1)?,
        batch,
        created_at: row.get(3)?,
    })
}

fn resource_from_row(row: &Row<'_>) -> rusqlite::Result<Resource> {
    let path: String = row.get(2)?;
    Ok(Resource {
        id: row.get(0)?,
        name: row.get(1)?,
        path: PathBuf::from(path),
    })
}
