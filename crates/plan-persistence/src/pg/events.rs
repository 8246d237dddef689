use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::{debug, warn};
use serde_json::Value;
use uuid::Uuid;

use plan_core::{CoreEngineError, EventStore, WorkflowEvent, WorkflowEventKind};

use super::{with_retry, ConnectionProvider};
use crate::error::PersistenceError;
use crate::schema::workflow_events;

#[derive(Insertable, Debug)]
#[diesel(table_name = workflow_events)]
struct NewEventRow<'a> {
    workflow_id: &'a Uuid,
    event_type: &'a str,
    payload: &'a Value,
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = workflow_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct EventRow {
    seq: i64,
    workflow_id: Uuid,
    ts: DateTime<Utc>,
    #[allow(dead_code)]
    event_type: String,
    payload: Value,
}

/// Log de eventos append-only. `payload` guarda el enum completo;
/// `event_type` es el nombre estable en minúsculas.
pub struct PgEventStore<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgEventStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: ConnectionProvider> EventStore for PgEventStore<P> {
    fn append_kind(&self, workflow_id: Uuid, kind: WorkflowEventKind) -> Result<WorkflowEvent, CoreEngineError> {
        let event_type = kind.type_name();
        let payload = serde_json::to_value(&kind).map_err(PersistenceError::from)?;
        let (seq, ts): (i64, DateTime<Utc>) = with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::insert_into(workflow_events::table)
                .values(NewEventRow { workflow_id: &workflow_id,
                                      event_type,
                                      payload: &payload })
                .returning((workflow_events::seq, workflow_events::ts))
                .get_result(&mut conn)
                .map_err(PersistenceError::from)
        })?;
        debug!("append_kind workflow_id={workflow_id} seq={seq} kind={event_type}");
        Ok(WorkflowEvent { seq: seq as u64,
                           workflow_id,
                           kind,
                           ts })
    }

    fn list(&self, workflow_id: Uuid) -> Result<Vec<WorkflowEvent>, CoreEngineError> {
        let rows: Vec<EventRow> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            workflow_events::table.filter(workflow_events::workflow_id.eq(workflow_id))
                                  .order(workflow_events::seq.asc())
                                  .select(EventRow::as_select())
                                  .load(&mut conn)
                                  .map_err(PersistenceError::from)
        })?;
        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<WorkflowEventKind>(row.payload) {
                Ok(kind) => events.push(WorkflowEvent { seq: row.seq as u64,
                                                        workflow_id: row.workflow_id,
                                                        kind,
                                                        ts: row.ts }),
                Err(e) => {
                    warn!("skipping unreadable event seq={} workflow_id={workflow_id}: {e}", row.seq);
                }
            }
        }
        Ok(events)
    }
}
