use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Float64Type, Int32Type, Int64Type, TimeUnit, TimestampMillisecondType};
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use chrono::DateTime;
use common::Result;
use serde_json::{Number, Value};

/// Renders query results as one JSON object per row.
pub fn batches_to_json(batches: &[RecordBatch]) -> Result<Vec<Value>> {
    let mut json_rows = Vec::new();

    for batch in batches {
        for row_idx in 0..batch.num_rows() {
            let mut row = serde_json::Map::new();

            for (col_idx, field) in batch.schema().fields().iter().enumerate() {
                let column = batch.column(col_idx);
                let value = arrow_array_to_json(column.as_ref(), row_idx)?;
                row.insert(field.name().clone(), value);
            }

            json_rows.push(Value::Object(row));
        }
    }

    Ok(json_rows)
}

pub fn arrow_array_to_json(array: &dyn Array, index: usize) -> Result<Value> {
    if array.is_null(index) {
        return Ok(Value::Null);
    }

    Ok(match array.data_type() {
        DataType::Int32 => Value::Number(Number::from(array.as_primitive::<Int32Type>().value(index))),
        DataType::Int64 => Value::Number(Number::from(array.as_primitive::<Int64Type>().value(index))),
        DataType::Float64 => Number::from_f64(array.as_primitive::<Float64Type>().value(index))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        DataType::Boolean => Value::Bool(array.as_boolean().value(index)),
        DataType::Utf8 => Value::String(array.as_string::<i32>().value(index).to_string()),
        DataType::LargeUtf8 => Value::String(array.as_string::<i64>().value(index).to_string()),
        DataType::Utf8View => Value::String(array.as_string_view().value(index).to_string()),
        DataType::Timestamp(TimeUnit::Millisecond, _) => {
            let millis = array.as_primitive::<TimestampMillisecondType>().value(index);
            DateTime::from_timestamp_millis(millis)
                .map(|dt| Value::String(dt.to_rfc3339()))
                .unwrap_or(Value::Null)
        }
        // Partition columns, aggregates and anything else: use Arrow's display.
        _ => {
            let formatter = ArrayFormatter::try_new(array, &FormatOptions::default())?;
            Value::String(formatter.value(index).to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray, TimestampMillisecondArray, UInt8Array};
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    #[test]
    fn test_batches_to_json() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("songplay_id", DataType::Int64, false),
            Field::new("song_id", DataType::Utf8, true),
            Field::new("duration", DataType::Float64, true),
            Field::new(
                "start_time",
                DataType::Timestamp(TimeUnit::Millisecond, None),
                false,
            ),
            Field::new("hour", DataType::UInt8, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef,
                Arc::new(StringArray::from(vec![Some("SOZCTXZ12AB0182364"), None])),
                Arc::new(Float64Array::from(vec![Some(269.58), None])),
                Arc::new(TimestampMillisecondArray::from(vec![1541106106796, 0])),
                Arc::new(UInt8Array::from(vec![21, 0])),
            ],
        )
        .unwrap();

        let rows = batches_to_json(&[batch]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["songplay_id"], 1);
        assert_eq!(rows[0]["song_id"], "SOZCTXZ12AB0182364");
        assert_eq!(rows[0]["duration"], 269.58);
        assert_eq!(rows[0]["start_time"], "2018-11-01T21:01:46.796+00:00");
        assert_eq!(rows[0]["hour"], "21");
        assert_eq!(rows[1]["song_id"], Value::Null);
        assert_eq!(rows[1]["duration"], Value::Null);
    }
}
