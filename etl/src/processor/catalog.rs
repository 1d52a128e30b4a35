use crate::processor::writer::WrittenTable;
use crate::schema::StarTableKind;
use crate::storage::ObjectStorage;
use crate::utils::paths::unescape_partition_value;
use arrow::array::{AsArray, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use common::{Error, Result};
use datafusion::common::{DataFusionError, ScalarValue, TableReference};
use datafusion::execution::context::SessionContext;
use datafusion::logical_expr::{ColumnarValue, Expr, ScalarUDF, Volatility, create_udf};
use datafusion::prelude::{ParquetReadOptions, col};
use std::sync::Arc;
use tracing::{debug, info};

/// Foreign keys as (table, column, dimension, nullable). The dimension
/// holds the referenced column under the same name; `nullable` keys are only
/// checked when present.
const FOREIGN_KEYS: [(&str, &str, &str, bool); 5] = [
    ("songplays", "start_time", "time", false),
    ("songplays", "user_id", "users", false),
    ("songplays", "song_id", "songs", true),
    ("songplays", "artist_id", "artists", true),
    ("songs", "artist_id", "artists", false),
];

/// Reverses the escaping applied to partition values in directory names.
fn url_decode(args: &[ColumnarValue]) -> datafusion::error::Result<ColumnarValue> {
    match &args[0] {
        ColumnarValue::Array(array) => {
            let strings = cast(array, &DataType::Utf8)?;
            let decoded: StringArray = strings
                .as_string::<i32>()
                .iter()
                .map(|value| value.map(unescape_partition_value))
                .collect();
            Ok(ColumnarValue::Array(Arc::new(decoded)))
        }
        ColumnarValue::Scalar(ScalarValue::Utf8(value)) => Ok(ColumnarValue::Scalar(
            ScalarValue::Utf8(value.as_deref().map(unescape_partition_value)),
        )),
        ColumnarValue::Scalar(other) => Err(DataFusionError::Internal(format!(
            "url_decode expects a string, got {}",
            other.data_type()
        ))),
    }
}

fn url_decode_udf() -> ScalarUDF {
    create_udf(
        "url_decode",
        vec![DataType::Utf8],
        DataType::Utf8,
        Volatility::Immutable,
        Arc::new(url_decode),
    )
}

/// The written star schema registered as DataFusion tables, partition
/// columns included.
pub struct StarCatalog {
    ctx: SessionContext,
}

impl StarCatalog {
    pub async fn open(storage: &dyn ObjectStorage) -> Result<Self> {
        let ctx = SessionContext::new();
        let location = storage.location();
        ctx.runtime_env()
            .register_object_store(&location.store_url()?, storage.object_store());

        let decode = url_decode_udf();
        ctx.register_udf(decode.clone());

        for kind in StarTableKind::ALL {
            let table_url = location.collection_url(kind.dir_name())?;
            let schema = kind.file_schema();
            let partition_cols = kind
                .partition_columns()
                .into_iter()
                .map(|(column, data_type)| (column.to_string(), data_type))
                .collect::<Vec<_>>();
            let escaped = partition_cols
                .iter()
                .any(|(_, data_type)| *data_type == DataType::Utf8);

            // String partition values come back escaped, so those tables are
            // read through a view that decodes them.
            let files_name = if escaped {
                format!("{}_files", kind.table_name())
            } else {
                kind.table_name().to_string()
            };

            let options = ParquetReadOptions::default()
                .schema(schema.as_ref())
                .table_partition_cols(partition_cols.clone());

            ctx.register_parquet(TableReference::bare(files_name.as_str()), &table_url, options)
                .await
                .map_err(|e| {
                    Error::Other(format!(
                        "Failed to register {} at {}: {}",
                        kind, table_url, e
                    ))
                })?;

            if escaped {
                let mut columns: Vec<Expr> =
                    schema.fields().iter().map(|field| col(field.name())).collect();
                for (column, data_type) in &partition_cols {
                    columns.push(if *data_type == DataType::Utf8 {
                        decode.call(vec![col(column)]).alias(column)
                    } else {
                        col(column)
                    });
                }

                let view = ctx
                    .table(TableReference::bare(files_name.as_str()))
                    .await?
                    .select(columns)?
                    .into_view();
                ctx.register_table(TableReference::bare(kind.table_name()), view)?;
            }
            debug!(table = %kind, url = %table_url, "Registered table");
        }

        Ok(Self { ctx })
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub async fn sql(&self, query: &str) -> Result<Vec<RecordBatch>> {
        let df = self.ctx.sql(query).await?;
        Ok(df.collect().await?)
    }

    pub async fn count(&self, query: &str) -> Result<usize> {
        Ok(self.ctx.sql(query).await?.count().await?)
    }

    pub async fn row_count(&self, kind: StarTableKind) -> Result<usize> {
        let df = self.ctx.table(TableReference::bare(kind.table_name())).await?;
        Ok(df.count().await?)
    }

    /// Reads the committed output back and checks it against what was
    /// written: row counts, then that every foreign key resolves.
    pub async fn verify(&self, written: &[WrittenTable]) -> Result<()> {
        for table in written {
            let actual = self.row_count(table.kind).await?;
            if actual != table.row_count {
                return Err(Error::Integrity(format!(
                    "{} has {} rows on storage, expected {}",
                    table.kind, actual, table.row_count
                )));
            }
        }

        for (table, column, dimension, nullable) in FOREIGN_KEYS {
            let presence = if nullable {
                format!("f.{} IS NOT NULL AND ", column)
            } else {
                String::new()
            };
            let query = format!(
                "SELECT f.{col} FROM \"{table}\" f \
                 LEFT JOIN \"{dim}\" d ON f.{col} = d.{col} \
                 WHERE {presence}d.{col} IS NULL",
                table = table,
                dim = dimension,
                col = column,
                presence = presence,
            );

            let orphans = self.count(&query).await?;
            if orphans > 0 {
                return Err(Error::Integrity(format!(
                    "{} {} rows reference a {} missing from {}",
                    orphans, table, column, dimension
                )));
            }
        }

        info!(tables = written.len(), "Output verified");
        Ok(())
    }
}
