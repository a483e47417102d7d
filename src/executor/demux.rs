use crate::codec::TypeRegistry;
use crate::driver::Cursor;
use crate::error::SqlTemplateError;
use crate::results::{
    ResultDescriptor, ResultKind, ResultPlan, ResultSet, ResultShape, ResultValue, RowReaderRegistry,
};
use crate::types::DriverValue;

/// One result event after naming and conversion.
#[derive(Debug)]
pub(super) struct Extracted {
    pub(super) kind: ResultKind,
    pub(super) name: String,
    pub(super) value: ResultValue,
}

/// Names and converts result events in the order the driver produces them.
pub(super) struct Demux<'a> {
    types: &'a TypeRegistry,
    readers: &'a RowReaderRegistry,
    plan: &'a ResultPlan,
    result_type: Option<&'a str>,
    case_insensitive: bool,
    position: usize,
}

impl<'a> Demux<'a> {
    pub(super) fn new(
        types: &'a TypeRegistry,
        readers: &'a RowReaderRegistry,
        plan: &'a ResultPlan,
        result_type: Option<&'a str>,
        case_insensitive: bool,
    ) -> Self {
        Self {
            types,
            readers,
            plan,
            result_type,
            case_insensitive,
            position: 0,
        }
    }

    fn advance(&mut self, kind: ResultKind) -> (usize, Option<&'a ResultDescriptor>) {
        self.position += 1;
        let plan = self.plan;
        (self.position, plan.descriptor_for(self.position, kind))
    }

    pub(super) fn cursor(&mut self, cursor: &mut dyn Cursor) -> Result<Extracted, SqlTemplateError> {
        let (position, descriptor) = self.advance(ResultKind::ResultSet);
        let value = self.read_cursor(descriptor, cursor)?;
        Ok(Extracted {
            kind: ResultKind::ResultSet,
            name: name_for(descriptor, || format!("#result-set-{position}")),
            value,
        })
    }

    pub(super) fn update_count(&mut self, count: u64) -> Extracted {
        let (position, descriptor) = self.advance(ResultKind::UpdateCount);
        Extracted {
            kind: ResultKind::UpdateCount,
            name: name_for(descriptor, || format!("#update-count-{position}")),
            value: ResultValue::UpdateCount(count),
        }
    }

    fn read_cursor(
        &self,
        descriptor: Option<&ResultDescriptor>,
        cursor: &mut dyn Cursor,
    ) -> Result<ResultValue, SqlTemplateError> {
        let shape = descriptor.map_or(ResultShape::Rows, |d| d.shape);
        match shape {
            ResultShape::Column | ResultShape::Scalar => {
                let codec = match descriptor.and_then(|d| d.logical_type.as_ref()) {
                    Some(logical) => self.types.resolve_logical(logical),
                    None => self.types.default_codec(),
                };
                let mut values = Vec::new();
                while let Some(row) = cursor.next_row()? {
                    let first = row.into_iter().next().unwrap_or(DriverValue::Null);
                    values.push(codec.from_driver(first, None)?);
                    if shape == ResultShape::Scalar {
                        break;
                    }
                }
                Ok(match shape {
                    ResultShape::Scalar => {
                        ResultValue::Scalar(values.into_iter().next().unwrap_or_default())
                    }
                    _ => ResultValue::Rows(values),
                })
            }
            ResultShape::Rows | ResultShape::Row => {
                let reader_name = descriptor
                    .and_then(|d| d.row_reader.as_deref())
                    .or(self.result_type);
                let reader = self.readers.resolve(reader_name)?;
                let codec = self.types.default_codec();

                let mut rs = ResultSet::with_capacity(if shape == ResultShape::Row { 1 } else { 16 });
                rs.set_column_names(cursor.columns().to_vec(), self.case_insensitive);
                while let Some(row) = cursor.next_row()? {
                    let values = row
                        .into_iter()
                        .map(|value| codec.from_driver(value, None))
                        .collect::<Result<Vec<_>, _>>()?;
                    rs.add_row_values(values);
                    if shape == ResultShape::Row {
                        break;
                    }
                }

                let rows = rs
                    .results
                    .iter()
                    .map(|row| reader.read_row(row))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(match shape {
                    ResultShape::Row => ResultValue::Row(rows.into_iter().next()),
                    _ => ResultValue::Rows(rows),
                })
            }
        }
    }
}

fn name_for(descriptor: Option<&ResultDescriptor>, fallback: impl FnOnce() -> String) -> String {
    descriptor
        .and_then(|d| d.name.clone())
        .unwrap_or_else(fallback)
}
