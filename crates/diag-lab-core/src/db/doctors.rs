//! Doctor directory database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{Doctor, DoctorStatistics};

impl Database {
    /// Insert a new doctor.
    pub fn insert_doctor(&self, doctor: &Doctor) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO doctors (doctor_id, name, qualifications, designation, workplace)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                doctor.doctor_id,
                doctor.name,
                doctor.qualifications,
                doctor.designation,
                doctor.workplace,
            ],
        )?;
        Ok(())
    }

    /// Get a doctor by ID.
    pub fn get_doctor(&self, doctor_id: &str) -> DbResult<Option<Doctor>> {
        self.conn
            .query_row(
                r#"
                SELECT doctor_id, name, qualifications, designation, workplace
                FROM doctors
                WHERE doctor_id = ?
                "#,
                [doctor_id],
                doctor_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List all doctors by name.
    pub fn list_doctors(&self) -> DbResult<Vec<Doctor>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT doctor_id, name, qualifications, designation, workplace
            FROM doctors
            ORDER BY name
            "#,
        )?;
        let rows = stmt.query_map([], doctor_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Delete a doctor. Refused while any report references them.
    pub fn delete_doctor(&self, doctor_id: &str) -> DbResult<bool> {
        let stats = self.doctor_statistics(doctor_id)?;
        if stats.total_reports > 0 {
            return Err(DbError::Constraint(format!(
                "doctor {} has {} report(s)",
                doctor_id, stats.total_reports
            )));
        }

        let rows_affected = self
            .conn
            .execute("DELETE FROM doctors WHERE doctor_id = ?", [doctor_id])?;
        Ok(rows_affected > 0)
    }

    /// Report counts and date span for a doctor.
    pub fn doctor_statistics(&self, doctor_id: &str) -> DbResult<DoctorStatistics> {
        self.conn
            .query_row(
                r#"
                SELECT
                    COUNT(*),
                    COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0),
                    MIN(report_date),
                    MAX(report_date)
                FROM reports
                WHERE doctor_id = ?
                "#,
                [doctor_id],
                |row| {
                    Ok(DoctorStatistics {
                        total_reports: row.get(0)?,
                        completed_reports: row.get(1)?,
                        pending_reports: row.get(2)?,
                        first_report_date: row.get(3)?,
                        last_report_date: row.get(4)?,
                    })
                },
            )
            .map_err(Into::into)
    }
}

fn doctor_from_row(row: &Row<'_>) -> rusqlite::Result<Doctor> {
    Ok(Doctor {
        doctor_id: row.get(0)?,
        name: row.get(1)?,
        qualifications: row.get(2)?,
        designation: row.get(3)?,
        workplace: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();
        let doctor = Doctor::new("Nasreen Akter", "MBBS, MD", "Pathologist", "NPL");
        db.insert_doctor(&doctor).unwrap();

        let retrieved = db.get_doctor(&doctor.doctor_id).unwrap().unwrap();
        assert_eq!(retrieved, doctor);
        assert_eq!(retrieved.name, "Dr. Nasreen Akter");
    }

    #[test]
    fn test_list_sorted_by_name() {
        let db = setup_db();
        db.insert_doctor(&Doctor::new("Zaman", "", "", "")).unwrap();
        db.insert_doctor(&Doctor::new("Ahmed", "", "", "")).unwrap();

        let names: Vec<_> = db.list_doctors().unwrap().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["Dr. Ahmed", "Dr. Zaman"]);
    }

    #[test]
    fn test_statistics_without_reports() {
        let db = setup_db();
        let doctor = Doctor::new("Ahmed", "", "", "");
        db.insert_doctor(&doctor).unwrap();

        let stats = db.doctor_statistics(&doctor.doctor_id).unwrap();
        assert_eq!(stats, DoctorStatistics::default());
    }

    #[test]
    fn test_delete_unreferenced_doctor() {
        let db = setup_db();
        let doctor = Doctor::new("Ahmed", "", "", "");
        db.insert_doctor(&doctor).unwrap();

        assert!(db.delete_doctor(&doctor.doctor_id).unwrap());
        assert!(db.get_doctor(&doctor.doctor_id).unwrap().is_none());
    }
}
