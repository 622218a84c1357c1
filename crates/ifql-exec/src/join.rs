//! Merge join: inner equi-join of two parents on time and the `on` tag
//! set.
//!
//! Rows buffer per parent and per partition key (bounds plus `on` tag
//! values). The join for a partition executes when its trigger fires,
//! which with the default spec means the minimum watermark across both
//! parents has passed the partition's stop. Duplicate timestamps within a
//! parent expand as a Cartesian product. The join function's body is
//! compiled once into a typed evaluator; float works with float and int
//! with int, while mixed operand types fail the query.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ifql_ast::{ArrowFunctionExpression, BinaryOperator, Expression};
use ifql_core::block::{Block, ColKind, ColMeta};
use ifql_core::id::DatasetId;
use ifql_core::time::Time;
use ifql_core::values::Value;
use ifql_core::{Error, Result};

use crate::alloc::{AllocGuard, Allocator};
use crate::block::PartitionKey;
use crate::dataset::{DataCache, Dataset};
use crate::lock;
use crate::transformation::{ParentState, Transformation};

/// The join function body, resolved against the two parameter names.
pub struct CompiledJoinExpr {
    root: JoinExpr,
}

enum JoinExpr {
    Param { side: usize, column: String },
    Int(i64),
    Float(f64),
    Op(ArithOp, Box<JoinExpr>, Box<JoinExpr>),
}

#[derive(Clone, Copy)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl CompiledJoinExpr {
    pub fn compile(f: &ArrowFunctionExpression) -> Result<Self> {
        if f.params.len() != 2 {
            return Err(Error::Type(
                "join function must take exactly two parameters".into(),
            ));
        }
        let params: Vec<&str> = f.params.iter().map(|p| p.name.as_str()).collect();
        Ok(Self {
            root: compile_node(&f.body, &params)?,
        })
    }

    fn eval(&self, left: RowRef<'_>, right: RowRef<'_>) -> Result<Value> {
        eval_node(&self.root, left, right)
    }
}

fn compile_node(expr: &Expression, params: &[&str]) -> Result<JoinExpr> {
    match expr {
        Expression::Member(m) => {
            let Expression::Identifier(obj) = &m.object else {
                return Err(Error::Type(
                    "join expression member must access a parameter".into(),
                ));
            };
            let side = params
                .iter()
                .position(|p| *p == obj.name)
                .ok_or_else(|| Error::Type(format!("unknown join parameter {:?}", obj.name)))?;
            let column = m
                .property_name()
                .ok_or_else(|| Error::Type("join member property must be a name".into()))?;
            Ok(JoinExpr::Param {
                side,
                column: column.to_string(),
            })
        }
        Expression::Integer(i) => Ok(JoinExpr::Int(i.value)),
        Expression::Float(f) => Ok(JoinExpr::Float(f.value)),
        Expression::Binary(b) => {
            let op = match b.operator {
                BinaryOperator::Add => ArithOp::Add,
                BinaryOperator::Sub => ArithOp::Sub,
                BinaryOperator::Mul => ArithOp::Mul,
                BinaryOperator::Div => ArithOp::Div,
                other => {
                    return Err(Error::Type(format!(
                        "operator {other} not supported in join expressions"
                    )));
                }
            };
            Ok(JoinExpr::Op(
                op,
                Box::new(compile_node(&b.left, params)?),
                Box::new(compile_node(&b.right, params)?),
            ))
        }
        other => Err(Error::Type(format!(
            "unsupported node in join expression: {other}"
        ))),
    }
}

#[derive(Clone, Copy)]
struct RowRef<'a> {
    cols: &'a [ColMeta],
    row: &'a [Value],
}

impl RowRef<'_> {
    fn get(&self, label: &str) -> Option<&Value> {
        self.cols
            .iter()
            .position(|c| c.label == label)
            .map(|i| &self.row[i])
    }
}

fn eval_node(node: &JoinExpr, left: RowRef<'_>, right: RowRef<'_>) -> Result<Value> {
    match node {
        JoinExpr::Param { side, column } => {
            let row = if *side == 0 { left } else { right };
            row.get(column)
                .cloned()
                .ok_or_else(|| Error::Type(format!("join row has no column {column:?}")))
        }
        JoinExpr::Int(v) => Ok(Value::Int(*v)),
        JoinExpr::Float(v) => Ok(Value::Float(*v)),
        JoinExpr::Op(op, l, r) => {
            let l = eval_node(l, left, right)?;
            let r = eval_node(r, left, right)?;
            apply(*op, l, r)
        }
    }
}

fn apply(op: ArithOp, l: Value, r: Value) -> Result<Value> {
    match (l, r) {
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(match op {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div => a / b,
        })),
        (Value::Int(a), Value::Int(b)) => match op {
            ArithOp::Add => Ok(Value::Int(a + b)),
            ArithOp::Sub => Ok(Value::Int(a - b)),
            ArithOp::Mul => Ok(Value::Int(a * b)),
            ArithOp::Div => {
                if b == 0 {
                    Err(Error::Type("integer division by zero in join".into()))
                } else {
                    Ok(Value::Int(a / b))
                }
            }
        },
        (Value::UInt(a), Value::UInt(b)) => match op {
            ArithOp::Add => Ok(Value::UInt(a + b)),
            ArithOp::Sub => Ok(Value::UInt(a.saturating_sub(b))),
            ArithOp::Mul => Ok(Value::UInt(a * b)),
            ArithOp::Div => {
                if b == 0 {
                    Err(Error::Type("integer division by zero in join".into()))
                } else {
                    Ok(Value::UInt(a / b))
                }
            }
        },
        (l, r) => Err(Error::JoinTypeMismatch(format!(
            "cannot combine {:?} with {:?}",
            l.data_type(),
            r.data_type()
        ))),
    }
}

struct SideTable {
    cols: Vec<ColMeta>,
    rows: Vec<(Time, Vec<Value>)>,
    guard: AllocGuard,
}

/// Per-parent, per-partition row buffers; sealing a key runs the join.
pub struct MergeJoinCache {
    alloc: Allocator,
    expr: CompiledJoinExpr,
    on: Vec<String>,
    sides: [Mutex<HashMap<PartitionKey, SideTable>>; 2],
}

impl MergeJoinCache {
    pub fn new(alloc: Allocator, f: &ArrowFunctionExpression, on: Vec<String>) -> Result<Self> {
        Ok(Self {
            alloc,
            expr: CompiledJoinExpr::compile(f)?,
            on,
            sides: [Mutex::new(HashMap::new()), Mutex::new(HashMap::new())],
        })
    }

    fn append(
        &self,
        side: usize,
        key: &PartitionKey,
        cols: &[ColMeta],
        time: Time,
        row: Vec<Value>,
    ) -> Result<()> {
        let bytes: usize = row.iter().map(Value::size_bytes).sum();
        let mut tables = lock(&self.sides[side]);
        let table = match tables.entry(key.clone()) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => e.insert(SideTable {
                cols: cols.to_vec(),
                rows: Vec::new(),
                guard: self.alloc.account(0)?,
            }),
        };
        if !table.guard.grow(bytes) {
            return Err(self.alloc.exhausted(bytes));
        }
        table.rows.push((time, row));
        Ok(())
    }

    fn join_partition(&self, key: &PartitionKey, l: &SideTable, r: &SideTable) -> Result<Block> {
        // Output schema: time, the joined value, and the left side's tags
        // that participate in the key.
        let mut out_cols = vec![ColMeta::time()];
        match l.cols.iter().find(|c| c.kind == ColKind::Value) {
            Some(v) => out_cols.push(v.clone()),
            None => return Err(Error::Type("join input has no value column".into())),
        }
        let tag_cols: Vec<ColMeta> = l
            .cols
            .iter()
            .filter(|c| c.kind == ColKind::Tag && (c.common || self.on.contains(&c.label)))
            .cloned()
            .collect();
        out_cols.extend(tag_cols.iter().cloned());

        let mut li: Vec<usize> = (0..l.rows.len()).collect();
        li.sort_by_key(|&i| l.rows[i].0);
        let mut ri: Vec<usize> = (0..r.rows.len()).collect();
        ri.sort_by_key(|&i| r.rows[i].0);

        let mut block = Block::new(key.bounds, out_cols);
        let (mut i, mut j) = (0, 0);
        while i < li.len() && j < ri.len() {
            let tl = l.rows[li[i]].0;
            let tr = r.rows[ri[j]].0;
            if tl < tr {
                i += 1;
                continue;
            }
            if tr < tl {
                j += 1;
                continue;
            }
            let mut i2 = i;
            while i2 < li.len() && l.rows[li[i2]].0 == tl {
                i2 += 1;
            }
            let mut j2 = j;
            while j2 < ri.len() && r.rows[ri[j2]].0 == tl {
                j2 += 1;
            }
            for &a in &li[i..i2] {
                let left = RowRef {
                    cols: &l.cols,
                    row: &l.rows[a].1,
                };
                for &b in &ri[j..j2] {
                    let right = RowRef {
                        cols: &r.cols,
                        row: &r.rows[b].1,
                    };
                    let value = self.expr.eval(left, right)?;
                    let mut row = vec![Value::Time(tl), value];
                    for tag in &tag_cols {
                        let v = left.get(&tag.label).cloned().unwrap_or_else(|| {
                            Value::Str(key.tag(&tag.label).unwrap_or_default().to_string())
                        });
                        row.push(v);
                    }
                    block.push_row(row);
                }
            }
            i = i2;
            j = j2;
        }
        Ok(block)
    }
}

impl DataCache for MergeJoinCache {
    fn partition_keys(&self) -> Vec<PartitionKey> {
        let mut keys: Vec<PartitionKey> = lock(&self.sides[0]).keys().cloned().collect();
        for key in lock(&self.sides[1]).keys() {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        keys
    }

    fn build(&self, key: &PartitionKey) -> Result<Block> {
        let left = lock(&self.sides[0]);
        let right = lock(&self.sides[1]);
        match (left.get(key), right.get(key)) {
            (Some(l), Some(r)) => self.join_partition(key, l, r),
            // Inner join: a one-sided partition produces nothing.
            _ => Ok(Block::new(key.bounds, Vec::new())),
        }
    }

    fn expire(&self, key: &PartitionKey) {
        lock(&self.sides[0]).remove(key);
        lock(&self.sides[1]).remove(key);
    }
}

/// The two-parent join transformation. Parent order is the declared table
/// order; the first parent binds to the join function's first parameter.
pub struct MergeJoinTransformation {
    dataset: Arc<Dataset<MergeJoinCache>>,
    parents: ParentState,
    left: DatasetId,
    right: DatasetId,
}

impl MergeJoinTransformation {
    pub fn new(dataset: Arc<Dataset<MergeJoinCache>>, parents: &[DatasetId]) -> Result<Self> {
        if parents.len() != 2 {
            return Err(Error::Plan(format!(
                "merge join requires exactly two parents, got {}",
                parents.len()
            )));
        }
        Ok(Self {
            dataset,
            parents: ParentState::new(parents),
            left: parents[0],
            right: parents[1],
        })
    }
}

impl Transformation for MergeJoinTransformation {
    fn process(&self, parent: DatasetId, block: &Block) -> Result<()> {
        let side = if parent == self.left {
            0
        } else if parent == self.right {
            1
        } else {
            return Err(Error::Plan(format!("unknown join parent {parent}")));
        };
        let cache = self.dataset.cache();
        let on_cols: Vec<(String, usize)> = cache
            .on
            .iter()
            .filter_map(|label| {
                block
                    .cols
                    .iter()
                    .position(|c| c.kind == ColKind::Tag && &c.label == label)
                    .map(|i| (label.clone(), i))
            })
            .collect();

        for i in 0..block.num_rows() {
            let tags: Vec<(String, String)> = on_cols
                .iter()
                .filter_map(|(label, idx)| {
                    block.data[*idx][i]
                        .as_str()
                        .map(|v| (label.clone(), v.to_string()))
                })
                .collect();
            let key = PartitionKey::new(block.bounds, tags);
            let time = block
                .row_time(i)
                .ok_or_else(|| Error::Type("join input row has no time".into()))?;
            cache.append(side, &key, &block.cols, time, block.row_values(i))?;
        }
        self.dataset.trigger_updates()
    }

    fn retract_block(&self, _parent: DatasetId, key: &PartitionKey) -> Result<()> {
        self.dataset.retract(key)
    }

    fn update_watermark(&self, parent: DatasetId, t: Time) -> Result<()> {
        let min = self.parents.update_watermark(parent, t);
        self.dataset.update_watermark(min)
    }

    fn update_processing_time(&self, _parent: DatasetId, t: Time) -> Result<()> {
        let latest = self.parents.update_processing_time(t);
        self.dataset.update_processing_time(latest)
    }

    fn finish(&self, parent: DatasetId, err: Option<Error>) {
        if let Some(err) = self.parents.finish(parent, err) {
            self.dataset.finish(err);
        }
    }
}
