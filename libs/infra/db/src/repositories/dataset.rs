use std::collections::HashMap;

use gradecore_models::{Dataset, Digest, Testcase};
use libsql::{params, Connection};

use crate::errors::DbError;

pub struct DatasetRepository {
    conn: Connection,
}

impl DatasetRepository {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, dataset_id: i64) -> Result<Dataset, DbError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, task_id, task_type_name, task_type_parameters_json, score_type_name,
                        score_type_parameters_json, time_limit_seconds, memory_limit_bytes,
                        managers_json, active, default_language
                 FROM datasets WHERE id = ?1",
                params![dataset_id],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Err(DbError::DatasetNotFound(dataset_id));
        };

        let managers_json: String = row.get(8)?;
        let managers: HashMap<String, Digest> =
            serde_json::from_str(&managers_json).map_err(|e| DbError::Mapping(e.to_string()))?;

        let task_type_parameters: serde_json::Value =
            serde_json::from_str(&row.get::<String>(3)?).map_err(|e| DbError::Mapping(e.to_string()))?;
        let score_type_parameters: serde_json::Value =
            serde_json::from_str(&row.get::<String>(5)?).map_err(|e| DbError::Mapping(e.to_string()))?;

        let testcases = self.testcases(dataset_id).await?;

        Ok(Dataset {
            id: row.get(0)?,
            task_id: row.get(1)?,
            task_type_name: row.get(2)?,
            task_type_parameters,
            score_type_name: row.get(4)?,
            score_type_parameters,
            testcases,
            time_limit_seconds: row.get(6)?,
            memory_limit_bytes: row.get(7)?,
            managers,
            active: row.get::<i64>(9)? != 0,
            default_language: row.get(10)?,
        })
    }

    async fn testcases(&self, dataset_id: i64) -> Result<Vec<Testcase>, DbError> {
        let mut rows = self
            .conn
            .query(
                "SELECT codename, input_digest, output_digest, public
                 FROM testcases WHERE dataset_id = ?1 ORDER BY codename",
                params![dataset_id],
            )
            .await?;

        let mut testcases = Vec::new();
        while let Some(row) = rows.next().await? {
            testcases.push(Testcase {
                codename: row.get(0)?,
                input: Digest::new(row.get::<String>(1)?),
                output: Digest::new(row.get::<String>(2)?),
                public: row.get::<i64>(3)? != 0,
            });
        }
        Ok(testcases)
    }

    pub async fn active_and_shadow_datasets(&self, task_id: i64) -> Result<Vec<i64>, DbError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id FROM datasets WHERE task_id = ?1 ORDER BY active DESC, id",
                params![task_id],
            )
            .await?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get(0)?);
        }
        Ok(ids)
    }
}
