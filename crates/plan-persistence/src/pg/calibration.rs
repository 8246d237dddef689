use chrono::Utc;
use diesel::prelude::*;
use log::debug;
use uuid::Uuid;

use plan_core::{CalibrationRepository, CoreEngineError};
use plan_domain::{CalibrationKey, CalibrationOutcome, CalibrationStat};

use super::rows::CalibrationRow;
use super::{with_retry, ConnectionProvider};
use crate::error::PersistenceError;
use crate::schema::calibration_stats as cs;

pub struct PgCalibrationRepository<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgCalibrationRepository<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: ConnectionProvider> CalibrationRepository for PgCalibrationRepository<P> {
    /// `INSERT .. ON CONFLICT DO UPDATE` sumando sobre el valor persistido:
    /// dos votos concurrentes nunca pisan el contador del otro.
    fn increment(&self, key: &CalibrationKey, outcome: CalibrationOutcome, weight: u64)
                 -> Result<CalibrationStat, CoreEngineError> {
        let w = i64::try_from(weight).map_err(|_| CoreEngineError::Validation(format!("weight out of range: {weight}")))?;
        let (fr, fa, cc) = match outcome {
            CalibrationOutcome::FalseReject => (w, 0, 0),
            CalibrationOutcome::FalseApprove => (0, w, 0),
            CalibrationOutcome::ConfirmedCorrect => (0, 0, w),
        };
        let now = Utc::now();
        let fresh = CalibrationRow { owner_id: key.owner_id,
                                     project_id: key.project_id,
                                     step: key.step as i32,
                                     category: key.category.clone(),
                                     false_reject_count: fr,
                                     false_approve_count: fa,
                                     confirmed_correct_count: cc,
                                     updated_at: now };
        let row: CalibrationRow = with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::insert_into(cs::table)
                .values(&fresh)
                .on_conflict((cs::owner_id, cs::project_id, cs::step, cs::category))
                .do_update()
                .set((cs::false_reject_count.eq(cs::false_reject_count + fr),
                      cs::false_approve_count.eq(cs::false_approve_count + fa),
                      cs::confirmed_correct_count.eq(cs::confirmed_correct_count + cc),
                      cs::updated_at.eq(now)))
                .returning(CalibrationRow::as_returning())
                .get_result(&mut conn)
                .map_err(PersistenceError::from)
        })?;
        debug!("calibration {} step={} {} +{weight}", key.category, key.step, outcome.counter_name());
        Ok(row.into_domain()?)
    }

    fn get(&self, key: &CalibrationKey) -> Result<Option<CalibrationStat>, CoreEngineError> {
        let row: Option<CalibrationRow> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            cs::table.find((key.owner_id, key.project_id, key.step as i32, key.category.as_str()))
                     .select(CalibrationRow::as_select())
                     .first(&mut conn)
                     .optional()
                     .map_err(PersistenceError::from)
        })?;
        Ok(row.map(CalibrationRow::into_domain).transpose()?)
    }

    fn list_for_project(&self, owner_id: Uuid, project_id: Uuid) -> Result<Vec<CalibrationStat>, CoreEngineError> {
        let rows: Vec<CalibrationRow> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            cs::table.filter(cs::owner_id.eq(owner_id))
                     .filter(cs::project_id.eq(project_id))
                     .order((cs::step.asc(), cs::category.asc()))
                     .select(CalibrationRow::as_select())
                     .load(&mut conn)
                     .map_err(PersistenceError::from)
        })?;
        rows.into_iter()
            .map(|r| r.into_domain().map_err(CoreEngineError::from))
            .collect()
    }
}
