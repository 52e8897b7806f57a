//! Bundled modules and the numeric array type
//!
//! Three modules can be imported: `math`, `collections` (for `deque`) and a
//! small `numpy` offering `array`, `zeros`, `ones`, `arange` and the `ndarray`
//! operations programs usually reach for: indexing and slicing along any
//! axis, boolean masks, broadcasting arithmetic and comparisons, and the
//! common reductions.

use super::calls::CallArgs;
use super::containers::{slice_positions, IndexValue};
use super::engine::Interpreter;
use super::errors::{Exec, RuntimeError};
use crate::memory::heap::{DType, HeapObject, NdArray};
use crate::memory::scope::Namespace;
use crate::memory::value::{Builtin, BuiltinType, ObjectId, Value};
use crate::parser::ast::{BinOp, CmpOp, UnaryOp};
use std::f64::consts;

/// Reverse the axes of an array
pub(crate) fn transpose(array: &NdArray) -> NdArray {
    if array.ndim() < 2 {
        return array.clone();
    }
    let shape: Vec<usize> = array.shape.iter().rev().copied().collect();
    let strides = strides(&array.shape);
    let data = (0..array.size())
        .map(|flat| {
            let source: usize = unravel(flat, &shape)
                .iter()
                .rev()
                .zip(&strides)
                .map(|(i, stride)| i * stride)
                .sum();
            array.data[source]
        })
        .collect();
    NdArray {
        dtype: array.dtype,
        shape,
        data,
    }
}

fn strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }
    strides
}

/// Multi-index of a flat row-major position
fn unravel(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut index = vec![0; shape.len()];
    for axis in (0..shape.len()).rev() {
        let dim = shape[axis].max(1);
        index[axis] = flat % dim;
        flat /= dim;
    }
    index
}

/// Shape as Python prints it, e.g. `(3,)` or `(2, 3)`
pub(crate) fn shape_text(shape: &[usize]) -> String {
    match shape {
        [single] => format!("({},)", single),
        _ => format!(
            "({})",
            shape.iter().map(usize::to_string).collect::<Vec<_>>().join(", ")
        ),
    }
}

/// Result shape of broadcasting two shapes together
fn broadcast_shapes(a: &[usize], b: &[usize]) -> Option<Vec<usize>> {
    let ndim = a.len().max(b.len());
    let dim = |shape: &[usize], axis: usize| {
        let offset = ndim - shape.len();
        if axis < offset {
            1
        } else {
            shape[axis - offset]
        }
    };
    (0..ndim)
        .map(|axis| match (dim(a, axis), dim(b, axis)) {
            (x, y) if x == y => Some(x),
            (1, y) => Some(y),
            (x, 1) => Some(x),
            _ => None,
        })
        .collect()
}

/// Values of `array` laid out over the broadcast `shape`
fn broadcast_to(array: &NdArray, shape: &[usize]) -> Vec<f64> {
    if array.shape == shape {
        return array.data.clone();
    }
    let offset = shape.len() - array.ndim();
    let strides = strides(&array.shape);
    let size: usize = shape.iter().product();
    (0..size)
        .map(|flat| {
            let index = unravel(flat, shape);
            let source: usize = array
                .shape
                .iter()
                .enumerate()
                .map(|(axis, dim)| if *dim == 1 { 0 } else { index[axis + offset] * strides[axis] })
                .sum();
            array.data[source]
        })
        .collect()
}

fn scalar_array(value: f64, dtype: DType) -> NdArray {
    NdArray {
        dtype,
        shape: Vec::new(),
        data: vec![value],
    }
}

/// Cast a value into an array's storage
fn cast(x: f64, dtype: DType) -> f64 {
    match dtype {
        DType::Int64 => x.trunc(),
        DType::Float64 => x,
        DType::Bool => (x != 0.0) as i64 as f64,
    }
}

fn merge_dtype(a: DType, b: DType) -> DType {
    match (a, b) {
        (DType::Float64, _) | (_, DType::Float64) => DType::Float64,
        (DType::Bool, DType::Bool) => DType::Bool,
        _ => DType::Int64,
    }
}

/// Selection along one axis
enum AxisPick {
    At(usize),
    Span(Vec<usize>),
}

impl Interpreter<'_> {
    /// `import name`, creating the module on first use
    pub(crate) fn import_module(&mut self, name: &str) -> Exec<Value> {
        if let Some(module) = self.modules.get(name) {
            return Ok(module.clone());
        }
        let mut attrs = Namespace::new();
        match name {
            "math" => {
                use Builtin::*;
                for builtin in [
                    MathSqrt, MathIsqrt, MathFloor, MathCeil, MathFabs, MathGcd, MathFactorial, MathLog, MathLog2,
                    MathLog10, MathExp, MathSin, MathCos, MathTan, MathHypot, Pow,
                ] {
                    attrs.insert(builtin.name().to_string(), Value::Builtin(builtin));
                }
                attrs.insert("pi".into(), Value::Float(consts::PI));
                attrs.insert("e".into(), Value::Float(consts::E));
                attrs.insert("tau".into(), Value::Float(consts::TAU));
                attrs.insert("inf".into(), Value::Float(f64::INFINITY));
                attrs.insert("nan".into(), Value::Float(f64::NAN));
            }
            "collections" => {
                attrs.insert("deque".into(), Value::Type(BuiltinType::Deque));
            }
            "numpy" => {
                for builtin in [Builtin::NpArray, Builtin::NpZeros, Builtin::NpOnes, Builtin::NpArange] {
                    attrs.insert(builtin.name().to_string(), Value::Builtin(builtin));
                }
                attrs.insert("ndarray".into(), Value::Type(BuiltinType::NdArray));
                attrs.insert("int64".into(), Value::str("int64"));
                attrs.insert("float64".into(), Value::str("float64"));
                attrs.insert("pi".into(), Value::Float(consts::PI));
                attrs.insert("e".into(), Value::Float(consts::E));
            }
            _ => {
                return Err(RuntimeError::ModuleNotFoundError(format!("No module named '{}'", name)).into());
            }
        }
        tracing::debug!(module = name, "importing bundled module");
        let module = self.alloc(HeapObject::Module {
            name: name.to_string(),
            attrs,
        });
        self.modules.insert(name.to_string(), module.clone());
        Ok(module)
    }

    /// Public names bound by `from module import *`
    pub(crate) fn module_exports(&self, module: &Value) -> Exec<Vec<(String, Value)>> {
        match self.heap.deref(module) {
            Some(HeapObject::Module { attrs, .. }) => Ok(attrs
                .iter()
                .filter(|(name, _)| !name.starts_with('_'))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect()),
            _ => Err(RuntimeError::type_error("import * requires a module").into()),
        }
    }

    pub(crate) fn is_array(&self, value: &Value) -> bool {
        matches!(self.heap.deref(value), Some(HeapObject::Array(_)))
    }

    fn array_value(&mut self, array: NdArray) -> Value {
        if array.shape.is_empty() {
            return array.element(0);
        }
        self.alloc(HeapObject::Array(array))
    }

    /// Elements along the first axis, sub-arrays for more than one dimension
    pub(crate) fn array_rows(&mut self, array: &NdArray) -> Vec<Value> {
        let rows = array.shape.first().copied().unwrap_or(0);
        if array.ndim() == 1 {
            return (0..rows).map(|i| array.element(i)).collect();
        }
        let stride = array.row_stride();
        (0..rows)
            .map(|r| {
                let row = NdArray {
                    dtype: array.dtype,
                    shape: array.shape[1..].to_vec(),
                    data: array.data[r * stride..(r + 1) * stride].to_vec(),
                };
                self.alloc(HeapObject::Array(row))
            })
            .collect()
    }

    /// Array built from a scalar, a nested sequence or another array
    fn to_array(&mut self, value: &Value) -> Exec<NdArray> {
        match value {
            Value::Bool(b) => return Ok(scalar_array(*b as i64 as f64, DType::Bool)),
            Value::Int(n) => return Ok(scalar_array(*n as f64, DType::Int64)),
            Value::Float(x) => return Ok(scalar_array(*x, DType::Float64)),
            _ => {}
        }
        match self.heap.deref(value) {
            Some(HeapObject::Array(array)) => return Ok(array.clone()),
            Some(
                HeapObject::List(_)
                | HeapObject::Tuple(_)
                | HeapObject::Range { .. }
                | HeapObject::Deque { .. }
                | HeapObject::Iterator { .. },
            ) => {}
            _ => {
                return Err(RuntimeError::type_error(format!(
                    "unsupported array element type '{}'",
                    self.type_name(value)
                ))
                .into())
            }
        }
        let items = self.collect_iterable(value)?;
        let mut rows = Vec::with_capacity(items.len());
        for item in &items {
            rows.push(self.to_array(item)?);
        }
        let inner = rows.first().map(|row| row.shape.clone()).unwrap_or_default();
        if rows.iter().any(|row| row.shape != inner) {
            return Err(RuntimeError::value_error(format!(
                "setting an array element with a sequence. The requested array has an inhomogeneous shape after 1 dimensions. The detected shape was ({},) + inhomogeneous part.",
                rows.len()
            ))
            .into());
        }
        let dtype = rows
            .iter()
            .map(|row| row.dtype)
            .reduce(merge_dtype)
            .unwrap_or(DType::Float64);
        let mut shape = vec![rows.len()];
        shape.extend(inner);
        Ok(NdArray {
            dtype,
            shape,
            data: rows.into_iter().flat_map(|row| row.data).collect(),
        })
    }

    fn parse_dtype(&self, value: &Value) -> Exec<Option<DType>> {
        let dtype = match value {
            Value::None => return Ok(None),
            Value::Type(BuiltinType::Int) => DType::Int64,
            Value::Type(BuiltinType::Float) => DType::Float64,
            Value::Type(BuiltinType::Bool) => DType::Bool,
            Value::Str(name) => match name.as_ref() {
                "int" | "int64" | "int32" => DType::Int64,
                "float" | "float64" | "float32" => DType::Float64,
                "bool" => DType::Bool,
                other => {
                    return Err(RuntimeError::type_error(format!("data type '{}' not understood", other)).into())
                }
            },
            other => {
                return Err(RuntimeError::type_error(format!(
                    "Cannot interpret '{}' as a data type",
                    self.repr_plain(other)
                ))
                .into())
            }
        };
        Ok(Some(dtype))
    }

    fn repr_plain(&self, value: &Value) -> String {
        super::format::repr(&self.heap, value)
    }

    fn shape_argument(&self, value: &Value) -> Exec<Vec<usize>> {
        let dims = match self.heap.deref(value) {
            Some(HeapObject::Tuple(items) | HeapObject::List(items)) => items.clone(),
            _ => vec![value.clone()],
        };
        dims.iter()
            .map(|dim| -> Exec<usize> {
                let n = self.expect_int(dim)?;
                if n < 0 {
                    return Err(RuntimeError::value_error("negative dimensions are not allowed").into());
                }
                Ok(n as usize)
            })
            .collect()
    }

    /// `numpy.array`, `numpy.zeros`, `numpy.ones` and `numpy.arange`
    pub(crate) fn call_numpy(&mut self, builtin: Builtin, mut args: CallArgs) -> Exec<Value> {
        let name = builtin.name();
        let dtype = match args.take_keyword("dtype") {
            Some(value) => self.parse_dtype(&value)?,
            None => None,
        };
        args.no_keywords(name)?;
        let array = match builtin {
            Builtin::NpArray => {
                args.arity(name, 1, 2)?;
                if let Some(value) = args.positional.get(1) {
                    if dtype.is_some() {
                        return Err(RuntimeError::type_error("argument for array() given by name ('dtype') and position (2)").into());
                    }
                    let dtype = self.parse_dtype(value)?;
                    let array = self.to_array(&args.positional[0])?;
                    return Ok(self.finish_array(array, dtype));
                }
                self.to_array(&args.positional[0])?
            }
            Builtin::NpZeros | Builtin::NpOnes => {
                args.arity(name, 1, 1)?;
                let shape = self.shape_argument(&args.positional[0])?;
                let fill = if builtin == Builtin::NpOnes { 1.0 } else { 0.0 };
                let size = shape.iter().product();
                NdArray {
                    dtype: DType::Float64,
                    shape,
                    data: vec![fill; size],
                }
            }
            _ => {
                args.arity(name, 1, 3)?;
                let (start, stop) = match args.positional.len() {
                    1 => (Value::Int(0), args.positional[0].clone()),
                    _ => (args.positional[0].clone(), args.positional[1].clone()),
                };
                let step = args.positional.get(2).cloned().unwrap_or(Value::Int(1));
                let integral = [&start, &stop, &step].iter().all(|v| v.as_int().is_some());
                let (start, stop, step) = (self.expect_float(&start)?, self.expect_float(&stop)?, self.expect_float(&step)?);
                if step == 0.0 {
                    return Err(RuntimeError::ZeroDivisionError("division by zero".into()).into());
                }
                let count = ((stop - start) / step).ceil().max(0.0) as usize;
                NdArray {
                    dtype: if integral { DType::Int64 } else { DType::Float64 },
                    shape: vec![count],
                    data: (0..count).map(|i| start + i as f64 * step).collect(),
                }
            }
        };
        Ok(self.finish_array(array, dtype))
    }

    fn finish_array(&mut self, mut array: NdArray, dtype: Option<DType>) -> Value {
        if let Some(dtype) = dtype {
            array.dtype = dtype;
            array.data.iter_mut().for_each(|x| *x = cast(*x, dtype));
        }
        self.alloc(HeapObject::Array(array))
    }

    /// Per-axis selections of a subscript
    fn axis_picks(&self, array: &NdArray, index: &IndexValue) -> Exec<Vec<AxisPick>> {
        let parts = match index {
            IndexValue::Multi(parts) => parts.clone(),
            single => vec![single.clone()],
        };
        if parts.len() > array.ndim() {
            return Err(RuntimeError::IndexError(format!(
                "too many indices for array: array is {}-dimensional, but {} were indexed",
                array.ndim(),
                parts.len()
            ))
            .into());
        }
        let mut picks = Vec::with_capacity(array.ndim());
        for (axis, &dim) in array.shape.iter().enumerate() {
            let pick = match parts.get(axis) {
                None => AxisPick::Span((0..dim).collect()),
                Some(IndexValue::Slice { lower, upper, step }) => {
                    AxisPick::Span(slice_positions(dim, *lower, *upper, *step)?)
                }
                Some(IndexValue::Single(value)) => match value.as_int() {
                    Some(n) => {
                        let resolved = if n < 0 { n + dim as i64 } else { n };
                        if !(0..dim as i64).contains(&resolved) {
                            return Err(RuntimeError::IndexError(format!(
                                "index {} is out of bounds for axis {} with size {}",
                                n, axis, dim
                            ))
                            .into());
                        }
                        AxisPick::At(resolved as usize)
                    }
                    None => return Err(self.bad_array_index().into()),
                },
                Some(IndexValue::Multi(_)) => return Err(self.bad_array_index().into()),
            };
            picks.push(pick);
        }
        Ok(picks)
    }

    fn bad_array_index(&self) -> RuntimeError {
        RuntimeError::IndexError(
            "only integers, slices (`:`), ellipsis (`...`), numpy.newaxis (`None`) and integer or boolean arrays are valid indices"
                .into(),
        )
    }

    /// Flat positions chosen by `picks`, and the shape they form
    fn selection(array: &NdArray, picks: &[AxisPick]) -> (Vec<usize>, Vec<usize>) {
        let strides = strides(&array.shape);
        let shape: Vec<usize> = picks
            .iter()
            .filter_map(|pick| match pick {
                AxisPick::Span(positions) => Some(positions.len()),
                AxisPick::At(_) => None,
            })
            .collect();
        let mut positions = vec![0usize];
        for (pick, stride) in picks.iter().zip(&strides) {
            positions = match pick {
                AxisPick::At(i) => positions.iter().map(|p| p + i * stride).collect(),
                AxisPick::Span(span) => positions
                    .iter()
                    .flat_map(|p| span.iter().map(move |i| p + i * stride))
                    .collect(),
            };
        }
        (positions, shape)
    }

    /// Boolean mask of the same shape as `array`, if `index` is one
    fn mask_of(&self, array: &NdArray, index: &IndexValue) -> Option<Vec<usize>> {
        let IndexValue::Single(value) = index else {
            return None;
        };
        match self.heap.deref(value) {
            Some(HeapObject::Array(mask)) if mask.dtype == DType::Bool && mask.shape == array.shape => Some(
                mask.data
                    .iter()
                    .enumerate()
                    .filter(|(_, flag)| **flag != 0.0)
                    .map(|(i, _)| i)
                    .collect(),
            ),
            _ => None,
        }
    }

    /// `array[index]`
    pub(crate) fn array_get_item(&mut self, array: &NdArray, index: &IndexValue) -> Exec<Value> {
        let (positions, shape) = match self.mask_of(array, index) {
            Some(positions) => {
                let len = positions.len();
                (positions, vec![len])
            }
            None => {
                let picks = self.axis_picks(array, index)?;
                Self::selection(array, &picks)
            }
        };
        let selected = NdArray {
            dtype: array.dtype,
            shape,
            data: positions.iter().map(|p| array.data[*p]).collect(),
        };
        Ok(self.array_value(selected))
    }

    /// `array[index] = value`, broadcasting a scalar or a matching sequence
    pub(crate) fn array_set_item(&mut self, id: ObjectId, index: &IndexValue, value: Value) -> Exec<()> {
        let array = match self.object(id)? {
            HeapObject::Array(array) => array.clone(),
            _ => return Err(RuntimeError::Internal("array assignment on a non-array".into()).into()),
        };
        let (positions, shape) = match self.mask_of(&array, index) {
            Some(positions) => {
                let len = positions.len();
                (positions, vec![len])
            }
            None => {
                let picks = self.axis_picks(&array, index)?;
                Self::selection(&array, &picks)
            }
        };
        let source = self.to_array(&value)?;
        let fitted = match broadcast_shapes(&source.shape, &shape) {
            Some(target) if target == shape => broadcast_to(&source, &shape),
            _ => {
                return Err(RuntimeError::value_error(format!(
                    "could not broadcast input array from shape {} into shape {}",
                    shape_text(&source.shape),
                    shape_text(&shape)
                ))
                .into())
            }
        };
        if let HeapObject::Array(target) = self.object_mut(id)? {
            let dtype = target.dtype;
            for (position, x) in positions.into_iter().zip(fitted) {
                target.data[position] = cast(x, dtype);
            }
        }
        Ok(())
    }

    /// Broadcast two operands, returning their common shape and data
    fn broadcast_pair(&mut self, left: &Value, right: &Value) -> Exec<(NdArray, NdArray, Vec<usize>)> {
        let left = self.to_array(left)?;
        let right = self.to_array(right)?;
        let shape = broadcast_shapes(&left.shape, &right.shape).ok_or_else(|| {
            RuntimeError::value_error(format!(
                "operands could not be broadcast together with shapes {} {} ",
                shape_text(&left.shape),
                shape_text(&right.shape)
            ))
        })?;
        Ok((left, right, shape))
    }

    /// Element-wise `left <op> right`
    pub(crate) fn array_binary(&mut self, op: BinOp, left: &Value, right: &Value) -> Exec<Value> {
        let (l, r, shape) = self.broadcast_pair(left, right)?;
        let dtype = match op {
            BinOp::Div => DType::Float64,
            BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr => {
                if l.dtype == DType::Float64 || r.dtype == DType::Float64 {
                    return Err(RuntimeError::type_error(format!(
                        "ufunc '{}' not supported for the input types",
                        match op {
                            BinOp::BitAnd => "bitwise_and",
                            BinOp::BitOr => "bitwise_or",
                            BinOp::BitXor => "bitwise_xor",
                            BinOp::Shl => "left_shift",
                            _ => "right_shift",
                        }
                    ))
                    .into());
                }
                match (op, merge_dtype(l.dtype, r.dtype)) {
                    (BinOp::Shl | BinOp::Shr, _) => DType::Int64,
                    (_, dtype) => dtype,
                }
            }
            _ => match merge_dtype(l.dtype, r.dtype) {
                DType::Bool => DType::Int64,
                dtype => dtype,
            },
        };
        let (a, b) = (broadcast_to(&l, &shape), broadcast_to(&r, &shape));
        let mut data = Vec::with_capacity(a.len());
        for (x, y) in a.into_iter().zip(b) {
            data.push(if dtype == DType::Float64 {
                match op {
                    BinOp::Add => x + y,
                    BinOp::Sub => x - y,
                    BinOp::Mul => x * y,
                    BinOp::Div => x / y,
                    BinOp::FloorDiv => (x / y).floor(),
                    BinOp::Mod if y == 0.0 => f64::NAN,
                    BinOp::Mod => x - y * (x / y).floor(),
                    _ => x.powf(y),
                }
            } else {
                let (x, y) = (x as i64, y as i64);
                let n = match op {
                    BinOp::Add => x.wrapping_add(y),
                    BinOp::Sub => x.wrapping_sub(y),
                    BinOp::Mul => x.wrapping_mul(y),
                    BinOp::FloorDiv => super::ops::floor_div(x, y).unwrap_or(0),
                    BinOp::Mod => super::ops::floor_mod(x, y).unwrap_or(0),
                    BinOp::BitAnd => x & y,
                    BinOp::BitOr => x | y,
                    BinOp::BitXor => x ^ y,
                    BinOp::Shl => x.checked_shl(y as u32).unwrap_or(0),
                    BinOp::Shr => x.checked_shr(y as u32).unwrap_or(if x < 0 { -1 } else { 0 }),
                    _ => {
                        if y < 0 {
                            return Err(RuntimeError::value_error(
                                "Integers to negative integer powers are not allowed.",
                            )
                            .into());
                        }
                        x.wrapping_pow(y.min(u32::MAX as i64) as u32)
                    }
                };
                n as f64
            });
        }
        Ok(self.array_value(NdArray { dtype, shape, data }))
    }

    /// Element-wise unary operator; `not` asks for the array's truth value
    pub(crate) fn array_unary(&mut self, op: UnaryOp, operand: &Value) -> Exec<Value> {
        if op == UnaryOp::Not {
            return Ok(Value::Bool(!self.truthy(operand)?));
        }
        let mut array = self.to_array(operand)?;
        match (op, array.dtype) {
            (UnaryOp::Neg, DType::Bool) => {
                return Err(RuntimeError::type_error(
                    "The numpy boolean negative, the `-` operator, is not supported, use the `~` operator or the logical_not function instead.",
                )
                .into())
            }
            (UnaryOp::Invert, DType::Float64) => {
                return Err(RuntimeError::type_error("ufunc 'invert' not supported for the input types").into())
            }
            (UnaryOp::Neg, _) => array.data.iter_mut().for_each(|x| *x = -*x),
            (UnaryOp::Invert, DType::Bool) => array.data.iter_mut().for_each(|x| *x = (*x == 0.0) as i64 as f64),
            (UnaryOp::Invert, _) => array.data.iter_mut().for_each(|x| *x = !(*x as i64) as f64),
            _ => {}
        }
        Ok(self.array_value(array))
    }

    /// Element-wise comparison producing a boolean array
    pub(crate) fn array_compare(&mut self, op: CmpOp, left: &Value, right: &Value) -> Exec<Value> {
        let (l, r, shape) = match self.broadcast_pair(left, right) {
            Ok(pair) => pair,
            Err(_) if matches!(op, CmpOp::Eq | CmpOp::NotEq) => return Ok(Value::Bool(op == CmpOp::NotEq)),
            Err(err) => return Err(err),
        };
        let test: fn(f64, f64) -> bool = match op {
            CmpOp::Eq => |x, y| x == y,
            CmpOp::NotEq => |x, y| x != y,
            CmpOp::Lt => |x, y| x < y,
            CmpOp::Le => |x, y| x <= y,
            CmpOp::Gt => |x, y| x > y,
            CmpOp::Ge => |x, y| x >= y,
            _ => return Err(RuntimeError::Internal(format!("array comparison '{}'", op.symbol())).into()),
        };
        let data = broadcast_to(&l, &shape)
            .into_iter()
            .zip(broadcast_to(&r, &shape))
            .map(|(x, y)| test(x, y) as i64 as f64)
            .collect();
        Ok(self.array_value(NdArray {
            dtype: DType::Bool,
            shape,
            data,
        }))
    }

    /// Nested list of the array's scalars
    fn array_to_list(&mut self, array: &NdArray, offset: usize, axis: usize) -> Value {
        let strides = strides(&array.shape);
        let items = (0..array.shape[axis])
            .map(|i| {
                let start = offset + i * strides[axis];
                if axis + 1 == array.ndim() {
                    array.element(start)
                } else {
                    self.array_to_list(array, start, axis + 1)
                }
            })
            .collect();
        self.alloc(HeapObject::List(items))
    }

    /// Reduce along `axis`, or over every element when it is `None`
    fn reduce(
        &mut self,
        array: &NdArray,
        axis: Option<usize>,
        dtype: DType,
        fold: impl Fn(&[f64]) -> f64,
    ) -> Value {
        let Some(axis) = axis else {
            return scalar_array(fold(&array.data), dtype).element(0);
        };
        let mut shape = array.shape.clone();
        let dim = shape.remove(axis);
        let stride = strides(&array.shape)[axis];
        let size: usize = shape.iter().product();
        let mut data = Vec::with_capacity(size);
        for flat in 0..size {
            // Flat index into the array with `axis` held at zero
            let outer = flat / stride;
            let inner = flat % stride;
            let base = outer * stride * dim + inner;
            let lane: Vec<f64> = (0..dim).map(|k| array.data[base + k * stride]).collect();
            data.push(fold(&lane));
        }
        self.array_value(NdArray { dtype, shape, data })
    }

    /// Methods of `ndarray`
    pub(crate) fn array_method(&mut self, id: ObjectId, name: &str, mut args: CallArgs) -> Exec<Value> {
        let array = match self.object(id)? {
            HeapObject::Array(array) => array.clone(),
            _ => return Err(RuntimeError::Internal("array method on a non-array".into()).into()),
        };
        let axis = match args.take_keyword("axis").or_else(|| match name {
            "reshape" => None,
            _ => args.positional.first().cloned(),
        }) {
            None | Some(Value::None) => None,
            Some(value) => {
                let n = self.expect_int(&value)?;
                let ndim = array.ndim() as i64;
                let resolved = if n < 0 { n + ndim } else { n };
                if !(0..ndim).contains(&resolved) {
                    return Err(RuntimeError::value_error(format!(
                        "axis {} is out of bounds for array of dimension {}",
                        n, ndim
                    ))
                    .into());
                }
                Some(resolved as usize)
            }
        };
        args.no_keywords(name)?;
        let empty_reduction = |operation: &str| -> Exec<Value> {
            Err(RuntimeError::value_error(format!(
                "zero-size array to reduction operation {} which has no identity",
                operation
            ))
            .into())
        };
        match name {
            "sum" => {
                let dtype = match array.dtype {
                    DType::Float64 => DType::Float64,
                    _ => DType::Int64,
                };
                Ok(self.reduce(&array, axis, dtype, |lane| lane.iter().sum()))
            }
            "mean" => {
                if array.size() == 0 {
                    return Ok(Value::Float(f64::NAN));
                }
                Ok(self.reduce(&array, axis, DType::Float64, |lane| {
                    lane.iter().sum::<f64>() / lane.len() as f64
                }))
            }
            "max" | "min" => {
                if array.size() == 0 {
                    return empty_reduction(if name == "max" { "maximum" } else { "minimum" });
                }
                let pick_max = name == "max";
                Ok(self.reduce(&array, axis, array.dtype, move |lane| {
                    lane.iter().copied().fold(if pick_max { f64::NEG_INFINITY } else { f64::INFINITY }, |acc, x| {
                        if x.is_nan() || acc.is_nan() {
                            f64::NAN
                        } else if pick_max {
                            acc.max(x)
                        } else {
                            acc.min(x)
                        }
                    })
                }))
            }
            "argmax" | "argmin" => {
                if array.size() == 0 {
                    return Err(RuntimeError::value_error(format!("attempt to get {} of an empty sequence", name)).into());
                }
                let pick_max = name == "argmax";
                Ok(self.reduce(&array, axis, DType::Int64, move |lane| {
                    let mut best = 0;
                    for (i, x) in lane.iter().enumerate() {
                        if (pick_max && *x > lane[best]) || (!pick_max && *x < lane[best]) {
                            best = i;
                        }
                    }
                    best as f64
                }))
            }
            "any" => Ok(self.reduce(&array, axis, DType::Bool, |lane| {
                lane.iter().any(|x| *x != 0.0) as i64 as f64
            })),
            "all" => Ok(self.reduce(&array, axis, DType::Bool, |lane| {
                lane.iter().all(|x| *x != 0.0) as i64 as f64
            })),
            "reshape" => {
                if args.positional.is_empty() {
                    return Err(RuntimeError::type_error("reshape() takes exactly 1 argument (0 given)").into());
                }
                let dims = match args.positional.as_slice() {
                    [single] => match self.heap.deref(single) {
                        Some(HeapObject::Tuple(items) | HeapObject::List(items)) => items.clone(),
                        _ => vec![single.clone()],
                    },
                    many => many.to_vec(),
                };
                let mut wanted = Vec::with_capacity(dims.len());
                for dim in &dims {
                    wanted.push(self.expect_int(dim)?);
                }
                if wanted.iter().any(|d| *d < -1) {
                    return Err(RuntimeError::value_error("negative dimensions not allowed").into());
                }
                let known: i64 = wanted.iter().filter(|d| **d != -1).product();
                let unknown = wanted.iter().filter(|d| **d == -1).count();
                let size = array.size() as i64;
                let mismatch = || {
                    RuntimeError::value_error(format!(
                        "cannot reshape array of size {} into shape {}",
                        size,
                        shape_text(&wanted.iter().map(|d| *d as usize).collect::<Vec<_>>())
                    ))
                };
                let shape: Vec<usize> = match unknown {
                    0 if known == size => wanted.iter().map(|d| *d as usize).collect(),
                    1 if known > 0 && size % known == 0 => wanted
                        .iter()
                        .map(|d| if *d == -1 { (size / known) as usize } else { *d as usize })
                        .collect(),
                    2.. => return Err(RuntimeError::value_error("can only specify one unknown dimension").into()),
                    _ => return Err(mismatch().into()),
                };
                Ok(self.alloc(HeapObject::Array(NdArray { shape, ..array })))
            }
            "flatten" => {
                let size = array.size();
                Ok(self.alloc(HeapObject::Array(NdArray {
                    shape: vec![size],
                    ..array
                })))
            }
            "copy" => Ok(self.alloc(HeapObject::Array(array))),
            "tolist" => {
                if array.ndim() == 0 {
                    return Ok(array.element(0));
                }
                Ok(self.array_to_list(&array, 0, 0))
            }
            _ => Err(RuntimeError::AttributeError(format!("'numpy.ndarray' object has no attribute '{}'", name)).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn matrix(rows: usize, cols: usize) -> NdArray {
        NdArray {
            dtype: DType::Int64,
            shape: vec![rows, cols],
            data: (0..rows * cols).map(|x| x as f64).collect(),
        }
    }

    #[test]
    fn test_transpose_swaps_axes() {
        let t = transpose(&matrix(2, 3));
        assert_eq!(t.shape, vec![3, 2]);
        assert_eq!(t.data, vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
    }

    #[test]
    fn test_broadcast_shapes() {
        assert_eq!(broadcast_shapes(&[2, 3], &[3]), Some(vec![2, 3]));
        assert_eq!(broadcast_shapes(&[2, 1], &[1, 4]), Some(vec![2, 4]));
        assert_eq!(broadcast_shapes(&[2], &[3]), None);
        assert_eq!(broadcast_shapes(&[], &[5]), Some(vec![5]));
    }

    #[test]
    fn test_broadcast_row_over_matrix() {
        let row = NdArray {
            dtype: DType::Int64,
            shape: vec![3],
            data: vec![10.0, 20.0, 30.0],
        };
        assert_eq!(
            broadcast_to(&row, &[2, 3]),
            vec![10.0, 20.0, 30.0, 10.0, 20.0, 30.0]
        );
    }

    #[test]
    fn test_shape_text() {
        assert_eq!(shape_text(&[3]), "(3,)");
        assert_eq!(shape_text(&[2, 3]), "(2, 3)");
    }

    #[test]
    fn test_unravel() {
        assert_eq!(unravel(5, &[2, 3]), vec![1, 2]);
        assert_eq!(strides(&[2, 3, 4]), vec![12, 4, 1]);
    }
}
