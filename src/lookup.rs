use crate::{
    data::student::{Student, StudentData},
    error::{ExecutionSnafu, LookupResult, MappingError, MappingSnafu},
    query::{QueryShape, build_safe, build_unsafe},
    storage::{BoundParam, QueryExecutor, RawRow},
};
use serde::Serialize;
use snafu::ResultExt;
use std::sync::Arc;

/// Rows from the unsafe endpoint, typed by the branch that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum UnsafeRecords {
    Students(Vec<Student>),
    Joined(Vec<StudentData>),
}

#[derive(Debug, Clone)]
pub struct UnsafeLookup {
    pub shape: QueryShape,
    pub executed_sql: String,
    pub records: UnsafeRecords,
}

#[derive(Debug, Clone)]
pub struct SafeLookup {
    pub executed_sql: &'static str,
    pub students: Vec<Student>,
}

#[derive(Clone)]
pub struct StudentLookupService {
    executor: Arc<dyn QueryExecutor>,
}

impl std::fmt::Debug for StudentLookupService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudentLookupService").finish_non_exhaustive()
    }
}

impl StudentLookupService {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    async fn fetch(&self, sql: &str, params: &[BoundParam]) -> LookupResult<Vec<RawRow>> {
        self.executor
            .execute(sql, params)
            .await
            .context(ExecutionSnafu { sql })
    }

    /// Looks students up by splicing `raw` into the statement text.
    pub async fn lookup_unsafe(&self, raw: &str) -> LookupResult<UnsafeLookup> {
        let stmt = build_unsafe(raw);
        debug!(shape = ?stmt.shape, sql = %stmt.sql, "running unsafe student lookup");

        let rows = self.fetch(&stmt.sql, &[]).await?;
        let records = if stmt.shape.is_join() {
            UnsafeRecords::Joined(map_rows(&rows, &stmt.sql, StudentData::from_joined_row)?)
        } else {
            UnsafeRecords::Students(map_rows(&rows, &stmt.sql, Student::from_by_id_row)?)
        };

        Ok(UnsafeLookup {
            shape: stmt.shape,
            executed_sql: stmt.sql,
            records,
        })
    }

    /// Looks a student up through the parameterized template. Card data is
    /// never selected, whatever `raw` holds.
    pub async fn lookup_safe(&self, raw: &str) -> LookupResult<SafeLookup> {
        let stmt = build_safe(raw)?;
        debug!(id = stmt.id(), sql = stmt.template(), "running safe student lookup");

        let rows = self.fetch(stmt.template(), &stmt.params()).await?;
        let students = map_rows(&rows, stmt.template(), Student::from_safe_row)?;

        Ok(SafeLookup {
            executed_sql: stmt.template(),
            students,
        })
    }
}

fn map_rows<T>(
    rows: &[RawRow],
    sql: &str,
    map: impl Fn(&RawRow) -> Result<T, MappingError>,
) -> LookupResult<Vec<T>> {
    rows.iter()
        .enumerate()
        .map(|(row, raw)| map(raw).context(MappingSnafu { row, sql }))
        .collect()
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::{
        error::{LookupErrorKind, MakeQuerySnafu, StoreError},
        query::{JOIN_PROJECTION_PREFIX, SAFE_TEMPLATE},
        storage::SqlValue::{self, Bool, Int, Null, Text},
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Hands back canned rows and records every statement it is given.
    #[derive(Default)]
    pub struct StubExecutor {
        rows: Vec<RawRow>,
        fail: bool,
        calls: Mutex<Vec<(String, Vec<BoundParam>)>>,
    }

    impl StubExecutor {
        pub fn returning(rows: Vec<Vec<SqlValue>>) -> Arc<Self> {
            Arc::new(Self {
                rows: rows.into_iter().map(RawRow::new).collect(),
                ..Self::default()
            })
        }

        pub fn failing() -> Arc<Self> {
            Arc::new(Self {
                fail: true,
                ..Self::default()
            })
        }

        pub fn calls(&self) -> Vec<(String, Vec<BoundParam>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QueryExecutor for StubExecutor {
        async fn execute(
            &self,
            sql: &str,
            params: &[BoundParam],
        ) -> Result<Vec<RawRow>, StoreError> {
            self.calls
                .lock()
                .unwrap()
                .push((sql.to_string(), params.to_vec()));
            if self.fail {
                return Err(sqlx::Error::Protocol(
                    "syntax error at or near \"OR\"".into(),
                ))
                .context(MakeQuerySnafu);
            }
            Ok(self.rows.clone())
        }
    }

    pub fn ann_by_id() -> Vec<SqlValue> {
        vec![Int(1), Text("Ann".into()), Int(20), Bool(true), Int(5)]
    }

    fn ann() -> Student {
        Student {
            id: 1,
            name: "Ann".into(),
            age: 20,
            sex: true,
            card_id: 5,
        }
    }

    #[tokio::test]
    async fn unsafe_by_id_maps_students() {
        let stub = StubExecutor::returning(vec![ann_by_id()]);
        let service = StudentLookupService::new(stub.clone());

        let found = service.lookup_unsafe("1").await.unwrap();
        assert_eq!(found.shape, QueryShape::RawById);
        assert_eq!(found.executed_sql, "SELECT * FROM students WHERE id = 1");
        assert_eq!(found.records, UnsafeRecords::Students(vec![ann()]));
        assert_eq!(
            stub.calls(),
            vec![("SELECT * FROM students WHERE id = 1".to_string(), vec![])]
        );
    }

    #[tokio::test]
    async fn unsafe_tautology_returns_every_row() {
        let bob = vec![Int(2), Text("Bob".into()), Int(22), Bool(false), Int(6)];
        let stub = StubExecutor::returning(vec![ann_by_id(), bob]);
        let service = StudentLookupService::new(stub.clone());

        let found = service.lookup_unsafe("1 OR 1=1").await.unwrap();
        assert_eq!(found.executed_sql, "SELECT * FROM students WHERE id = 1 OR 1=1");
        let UnsafeRecords::Students(students) = found.records else {
            panic!("expected plain students");
        };
        assert_eq!(students.len(), 2);
    }

    #[tokio::test]
    async fn unsafe_join_exposes_cards() {
        let row = vec![
            Int(1),
            Int(20),
            Bool(true),
            Int(5),
            Text("Ann".into()),
            Int(1),
            Int(5),
            Int(4_242_424_242_424_242),
            Int(1228),
            Int(777),
        ];
        let stub = StubExecutor::returning(vec![row]);
        let service = StudentLookupService::new(stub.clone());
        let clause = "JOIN card_credits cc ON cc.student_id = s.id WHERE TRUE";

        let found = service.lookup_unsafe(clause).await.unwrap();
        assert_eq!(found.shape, QueryShape::RawJoinPrefixed);
        assert_eq!(found.executed_sql, format!("{JOIN_PROJECTION_PREFIX}{clause}"));
        let UnsafeRecords::Joined(data) = found.records else {
            panic!("expected joined rows");
        };
        assert_eq!(data[0].student, ann());
        assert_eq!(data[0].card_credit.as_ref().map(|c| c.cvv), Some(777));
    }

    #[tokio::test]
    async fn unsafe_shape_mismatch_is_mapping_error() {
        // `* FROM students s JOIN ...` returns students.* first, which the
        // 10 column mapping cannot read
        let mut row = ann_by_id();
        row.extend([Int(5), Int(1), Int(4_000_000_000_000_000), Int(1226), Int(321)]);
        let stub = StubExecutor::returning(vec![row]);
        let service = StudentLookupService::new(stub);
        let raw = " * FROM students s JOIN card_credits cc ON cc.student_id = s.id ";

        let err = service.lookup_unsafe(raw).await.unwrap_err();
        assert_eq!(err.kind(), LookupErrorKind::Mapping);
        assert_eq!(err.executed_sql(), Some(format!("SELECT {}", raw.trim()).as_str()));
    }

    #[tokio::test]
    async fn unsafe_short_rows_do_not_panic() {
        let stub = StubExecutor::returning(vec![vec![Int(1)], vec![]]);
        let service = StudentLookupService::new(stub);

        let err = service.lookup_unsafe("1 UNION SELECT 1").await.unwrap_err();
        assert_eq!(err.kind(), LookupErrorKind::Mapping);
    }

    #[tokio::test]
    async fn execution_failure_is_distinct() {
        let service = StudentLookupService::new(StubExecutor::failing());

        let err = service.lookup_unsafe("1 OR").await.unwrap_err();
        assert_eq!(err.kind(), LookupErrorKind::Execution);
        assert_eq!(err.executed_sql(), Some("SELECT * FROM students WHERE id = 1 OR"));
        assert!(err.client_message().contains("syntax error"));

        let err = service.lookup_safe("3").await.unwrap_err();
        assert_eq!(err.kind(), LookupErrorKind::Execution);
        assert_eq!(err.executed_sql(), Some(SAFE_TEMPLATE));
    }

    #[tokio::test]
    async fn safe_binds_parameter() {
        let row = vec![Int(1), Int(20), Bool(true), Int(5), Text("Ann".into())];
        let stub = StubExecutor::returning(vec![row]);
        let service = StudentLookupService::new(stub.clone());

        let found = service.lookup_safe("1").await.unwrap();
        assert_eq!(found.students, vec![ann()]);
        assert_eq!(found.executed_sql, SAFE_TEMPLATE);
        assert_eq!(
            stub.calls(),
            vec![(SAFE_TEMPLATE.to_string(), vec![BoundParam::Int(1)])]
        );
    }

    #[tokio::test]
    async fn safe_never_reaches_storage_with_bad_input() {
        let stub = StubExecutor::returning(vec![ann_by_id()]);
        let service = StudentLookupService::new(stub.clone());

        for raw in [
            "1; DROP TABLE students",
            "1 OR 1=1",
            "JOIN card_credits cc ON cc.student_id = s.id WHERE TRUE",
            "* FROM card_credits JOIN students ON TRUE",
            "",
        ] {
            let err = service.lookup_safe(raw).await.unwrap_err();
            assert_eq!(err.kind(), LookupErrorKind::InvalidInput, "{raw}");
        }
        assert!(stub.calls().is_empty());
    }

    #[tokio::test]
    async fn safe_path_only_ever_sends_the_template() {
        let row = vec![Int(9), Int(30), Bool(false), Int(0), Text("Dan".into())];
        let stub = StubExecutor::returning(vec![row]);
        let service = StudentLookupService::new(stub.clone());

        for raw in ["9", "-9", "+9", "0"] {
            service.lookup_safe(raw).await.unwrap();
        }
        assert!(stub.calls().iter().all(|(sql, params)| sql == SAFE_TEMPLATE && params.len() == 1));
    }

    #[tokio::test]
    async fn safe_rejects_card_shaped_rows() {
        // even if storage returned more columns, the safe mapping reads five
        let mut row = vec![Int(1), Int(20), Bool(true), Int(5), Text("Ann".into())];
        row.extend([Int(1), Int(5), Int(4_000_000_000_000_000), Int(1226), Null]);
        let service = StudentLookupService::new(StubExecutor::returning(vec![row]));

        let err = service.lookup_safe("1").await.unwrap_err();
        assert_eq!(err.kind(), LookupErrorKind::Mapping);
    }

    #[tokio::test]
    async fn empty_result_is_empty_vec() {
        let service = StudentLookupService::new(StubExecutor::returning(vec![]));
        let found = service.lookup_unsafe("404").await.unwrap();
        assert_eq!(found.records, UnsafeRecords::Students(vec![]));
        assert!(service.lookup_safe("404").await.unwrap().students.is_empty());
    }
}
