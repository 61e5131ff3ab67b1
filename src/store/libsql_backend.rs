//! libSQL backend: async `ProcurementStore` implementation.
//!
//! Supports local file and in-memory databases. Money is stored as decimal
//! TEXT; line items, recipients, proposal items and attachments as JSON
//! columns.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::model::{
    Counterparty, ExtractedProposal, NewCounterparty, NewProposal, NewRequest, Request,
    RequestStatus, new_record_id,
};
use crate::store::migrations;
use crate::store::traits::ProcurementStore;

const REQUEST_COLUMNS: &str = "id, title, description, budget, currency, delivery_days, \
     payment_terms, warranty, line_items, sent_to, status, created_at, updated_at";

const COUNTERPARTY_COLUMNS: &str = "id, name, email, contact_person, phone, notes, created_at";

const PROPOSAL_COLUMNS: &str = "id, request_id, counterparty_id, raw_text, items, total_price, \
     currency, payment_terms, warranty, delivery_days, parsed, attachments, created_at";

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn query_one<T>(
        &self,
        op: &str,
        sql: String,
        id: &str,
        map: fn(&libsql::Row) -> Result<T, DatabaseError>,
    ) -> Result<Option<T>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(&sql, params![id])
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => map(&row).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("{op}: {e}"))),
        }
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

fn from_json<T: DeserializeOwned>(column: &str, raw: &str) -> Result<T, DatabaseError> {
    serde_json::from_str(raw)
        .map_err(|e| DatabaseError::Serialization(format!("{column}: {e}")))
}

fn parse_decimal(raw: Option<String>) -> Option<Decimal> {
    raw.and_then(|s| Decimal::from_str(&s).ok())
}

fn parse_days(raw: Option<i64>) -> Option<u32> {
    raw.and_then(|d| u32::try_from(d).ok())
}

fn row_error(op: &str) -> impl Fn(libsql::Error) -> DatabaseError + '_ {
    move |e| DatabaseError::Query(format!("{op} row parse: {e}"))
}

/// Map a libsql Row to a Request. Column order matches REQUEST_COLUMNS.
fn row_to_request(row: &libsql::Row) -> Result<Request, DatabaseError> {
    let err = row_error("request");
    let line_items: String = row.get(8).map_err(&err)?;
    let sent_to: String = row.get(9).map_err(&err)?;
    let status: String = row.get(10).map_err(&err)?;
    let created: String = row.get(11).map_err(&err)?;
    let updated: String = row.get(12).map_err(&err)?;

    Ok(Request {
        id: row.get(0).map_err(&err)?,
        title: row.get(1).map_err(&err)?,
        description: row.get(2).map_err(&err)?,
        budget: parse_decimal(row.get(3).ok()),
        currency: row.get(4).map_err(&err)?,
        delivery_days: parse_days(row.get(5).ok()),
        payment_terms: row.get(6).map_err(&err)?,
        warranty: row.get(7).map_err(&err)?,
        line_items: from_json("line_items", &line_items)?,
        sent_to: from_json("sent_to", &sent_to)?,
        status: status.parse().map_err(DatabaseError::Serialization)?,
        created_at: parse_datetime(&created),
        updated_at: parse_datetime(&updated),
    })
}

/// Map a libsql Row to a Counterparty. Column order matches COUNTERPARTY_COLUMNS.
fn row_to_counterparty(row: &libsql::Row) -> Result<Counterparty, DatabaseError> {
    let err = row_error("counterparty");
    let created: String = row.get(6).map_err(&err)?;

    Ok(Counterparty {
        id: row.get(0).map_err(&err)?,
        name: row.get(1).map_err(&err)?,
        email: row.get(2).map_err(&err)?,
        contact_person: row.get(3).ok(),
        phone: row.get(4).ok(),
        notes: row.get(5).ok(),
        created_at: parse_datetime(&created),
    })
}

/// Map a libsql Row to a proposal. Column order matches PROPOSAL_COLUMNS.
fn row_to_proposal(row: &libsql::Row) -> Result<ExtractedProposal, DatabaseError> {
    let err = row_error("proposal");
    let items: String = row.get(4).map_err(&err)?;
    let parsed: i64 = row.get(10).map_err(&err)?;
    let attachments: String = row.get(11).map_err(&err)?;
    let created: String = row.get(12).map_err(&err)?;

    Ok(ExtractedProposal {
        id: row.get(0).map_err(&err)?,
        request_id: row.get(1).map_err(&err)?,
        counterparty_id: row.get(2).map_err(&err)?,
        raw_text: row.get(3).map_err(&err)?,
        items: from_json("items", &items)?,
        total_price: parse_decimal(row.get(5).ok()),
        currency: row.get(6).map_err(&err)?,
        payment_terms: row.get(7).map_err(&err)?,
        warranty: row.get(8).map_err(&err)?,
        delivery_days: parse_days(row.get(9).ok()),
        parsed: parsed != 0,
        attachments: from_json("attachments", &attachments)?,
        created_at: parse_datetime(&created),
    })
}

#[async_trait]
impl ProcurementStore for LibSqlBackend {
    // ── Counterparties ──────────────────────────────────────────────

    async fn find_counterparty_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Counterparty>, DatabaseError> {
        let email = email.trim().to_lowercase();
        self.query_one(
            "find_counterparty_by_email",
            format!("SELECT {COUNTERPARTY_COLUMNS} FROM counterparties WHERE email = ?1"),
            &email,
            row_to_counterparty,
        )
        .await
    }

    async fn find_counterparty_by_id(
        &self,
        id: &str,
    ) -> Result<Option<Counterparty>, DatabaseError> {
        self.query_one(
            "find_counterparty_by_id",
            format!("SELECT {COUNTERPARTY_COLUMNS} FROM counterparties WHERE id = ?1"),
            id,
            row_to_counterparty,
        )
        .await
    }

    async fn create_counterparty(
        &self,
        new: &NewCounterparty,
    ) -> Result<Counterparty, DatabaseError> {
        let counterparty = Counterparty {
            id: new_record_id(),
            name: new.name.trim().to_string(),
            email: new.email.trim().to_lowercase(),
            contact_person: new.contact_person.clone(),
            phone: new.phone.clone(),
            notes: new.notes.clone(),
            created_at: Utc::now(),
        };

        self.conn()
            .execute(
                &format!(
                    "INSERT INTO counterparties ({COUNTERPARTY_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                ),
                params![
                    counterparty.id.clone(),
                    counterparty.name.clone(),
                    counterparty.email.clone(),
                    counterparty.contact_person.clone(),
                    counterparty.phone.clone(),
                    counterparty.notes.clone(),
                    counterparty.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| {
                let message = e.to_string();
                if message.contains("UNIQUE constraint failed") {
                    DatabaseError::Conflict(format!(
                        "a counterparty with email {} already exists",
                        counterparty.email
                    ))
                } else {
                    DatabaseError::Query(format!("create_counterparty: {message}"))
                }
            })?;

        debug!(counterparty_id = %counterparty.id, email = %counterparty.email, "Counterparty created");
        Ok(counterparty)
    }

    // ── Requests ────────────────────────────────────────────────────

    async fn find_request_by_id(&self, id: &str) -> Result<Option<Request>, DatabaseError> {
        self.query_one(
            "find_request_by_id",
            format!("SELECT {REQUEST_COLUMNS} FROM requests WHERE id = ?1"),
            &id.to_lowercase(),
            row_to_request,
        )
        .await
    }

    async fn create_request(&self, new: &NewRequest) -> Result<Request, DatabaseError> {
        let now = Utc::now();
        let request = Request {
            id: new_record_id(),
            title: new.title.clone(),
            description: new.description.clone(),
            budget: new.budget,
            currency: new.currency.clone(),
            delivery_days: new.delivery_days,
            payment_terms: new.payment_terms.clone(),
            warranty: new.warranty.clone(),
            line_items: new.line_items.clone(),
            sent_to: Vec::new(),
            status: RequestStatus::Draft,
            created_at: now,
            updated_at: now,
        };

        self.conn()
            .execute(
                &format!(
                    "INSERT INTO requests ({REQUEST_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                ),
                params![
                    request.id.clone(),
                    request.title.clone(),
                    request.description.clone(),
                    request.budget.map(|b| b.to_string()),
                    request.currency.clone(),
                    request.delivery_days.map(i64::from),
                    request.payment_terms.clone(),
                    request.warranty.clone(),
                    to_json(&request.line_items)?,
                    to_json(&request.sent_to)?,
                    request.status.as_str(),
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_request: {e}")))?;

        debug!(request_id = %request.id, title = %request.title, "Request created");
        Ok(request)
    }

    async fn mark_request_sent(
        &self,
        request_id: &str,
        counterparty_id: &str,
    ) -> Result<(), DatabaseError> {
        let request = self
            .find_request_by_id(request_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "request".into(),
                id: request_id.to_string(),
            })?;

        let mut sent_to = request.sent_to;
        if !sent_to.iter().any(|id| id == counterparty_id) {
            sent_to.push(counterparty_id.to_string());
        }

        self.conn()
            .execute(
                "UPDATE requests SET sent_to = ?1, status = ?2, updated_at = ?3 WHERE id = ?4",
                params![
                    to_json(&sent_to)?,
                    RequestStatus::Sent.as_str(),
                    Utc::now().to_rfc3339(),
                    request.id.clone(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("mark_request_sent: {e}")))?;

        debug!(request_id = %request.id, counterparty = %counterparty_id, "Request marked sent");
        Ok(())
    }

    // ── Proposals ───────────────────────────────────────────────────

    async fn create_proposal(
        &self,
        new: &NewProposal,
    ) -> Result<ExtractedProposal, DatabaseError> {
        let proposal = ExtractedProposal {
            id: new_record_id(),
            request_id: new.request_id.clone(),
            counterparty_id: new.counterparty_id.clone(),
            raw_text: new.raw_text.clone(),
            items: new.items.clone(),
            total_price: new.total_price,
            currency: new.currency.clone(),
            payment_terms: new.payment_terms.clone(),
            warranty: new.warranty.clone(),
            delivery_days: new.delivery_days,
            parsed: new.parsed,
            attachments: new.attachments.clone(),
            created_at: Utc::now(),
        };

        self.conn()
            .execute(
                &format!(
                    "INSERT INTO proposals ({PROPOSAL_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                ),
                params![
                    proposal.id.clone(),
                    proposal.request_id.clone(),
                    proposal.counterparty_id.clone(),
                    proposal.raw_text.clone(),
                    to_json(&proposal.items)?,
                    proposal.total_price.map(|p| p.to_string()),
                    proposal.currency.clone(),
                    proposal.payment_terms.clone(),
                    proposal.warranty.clone(),
                    proposal.delivery_days.map(i64::from),
                    i64::from(proposal.parsed),
                    to_json(&proposal.attachments)?,
                    proposal.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_proposal: {e}")))?;

        debug!(
            proposal_id = %proposal.id,
            request_id = %proposal.request_id,
            counterparty = %proposal.counterparty_id,
            "Proposal created"
        );
        Ok(proposal)
    }

    async fn find_proposals_by_request(
        &self,
        request_id: &str,
    ) -> Result<Vec<ExtractedProposal>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {PROPOSAL_COLUMNS} FROM proposals WHERE request_id = ?1 \
                     ORDER BY created_at ASC, rowid ASC"
                ),
                params![request_id.to_lowercase()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_proposals_by_request: {e}")))?;

        let mut proposals = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("find_proposals_by_request: {e}")))?
        {
            proposals.push(row_to_proposal(&row)?);
        }
        Ok(proposals)
    }
}
