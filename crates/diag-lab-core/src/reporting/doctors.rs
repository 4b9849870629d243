//! Referring doctor directory.

use tracing::{info, instrument};

use crate::db::Database;
use crate::error::{LabError, LabResult};
use crate::models::{bare_doctor_name, Actor, Doctor, DoctorStatistics};

pub struct DoctorDirectory<'a> {
    db: &'a Database,
}

impl<'a> DoctorDirectory<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Register a doctor. The name gets a "Dr. " title if it lacks one.
    #[instrument(skip(self, actor, qualifications, designation, workplace), fields(actor = %actor.username))]
    pub fn add_doctor(
        &self,
        actor: &Actor,
        name: &str,
        qualifications: &str,
        designation: &str,
        workplace: &str,
    ) -> LabResult<Doctor> {
        if bare_doctor_name(name).is_empty() {
            return Err(LabError::validation("doctor name is required"));
        }

        let doctor = Doctor::new(name, qualifications, designation, workplace);
        self.db.insert_doctor(&doctor)?;
        info!(doctor_id = %doctor.doctor_id, "doctor added");
        Ok(doctor)
    }

    pub fn get_doctor(&self, doctor_id: &str) -> LabResult<Doctor> {
        self.db
            .get_doctor(doctor_id)?
            .ok_or_else(|| LabError::not_found("doctor", doctor_id))
    }

    pub fn list_doctors(&self) -> LabResult<Vec<Doctor>> {
        Ok(self.db.list_doctors()?)
    }

    /// Remove a doctor who has no reports.
    #[instrument(skip(self, actor), fields(actor = %actor.username))]
    pub fn delete_doctor(&self, actor: &Actor, doctor_id: &str) -> LabResult<()> {
        self.db.run_in_transaction(|db| {
            if !db.delete_doctor(doctor_id)? {
                return Err(LabError::not_found("doctor", doctor_id));
            }
            info!("doctor deleted");
            Ok(())
        })
    }

    pub fn statistics(&self, doctor_id: &str) -> LabResult<DoctorStatistics> {
        self.get_doctor(doctor_id)?;
        Ok(self.db.doctor_statistics(doctor_id)?)
    }
}
