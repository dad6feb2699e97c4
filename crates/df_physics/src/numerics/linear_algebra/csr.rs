// crates/df_physics/src/numerics/linear_algebra/csr.rs

//! 压缩稀疏行（CSR）矩阵
//!
//! 有限面积方程的稀疏结构由网格决定（对角 + 面邻居），
//! 因此模式 [`CsrPattern`] 在网格上构建一次，每次组装只改写值。
//!
//! # 格式说明
//!
//! - `row_ptr`: 行指针，长度 n_rows + 1
//! - `col_idx`: 列索引，每行内升序
//! - `values`: 非零元值

use std::collections::BTreeMap;

// =============================================================================
// 稀疏模式
// =============================================================================

/// CSR 稀疏模式
#[derive(Debug, Clone)]
pub struct CsrPattern {
    n_rows: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
}

impl CsrPattern {
    /// 行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// 非零元数量
    #[inline]
    pub fn nnz(&self) -> usize {
        self.col_idx.len()
    }

    /// 第 row 行的列索引
    #[inline]
    pub fn row_indices(&self, row: usize) -> &[usize] {
        &self.col_idx[self.row_ptr[row]..self.row_ptr[row + 1]]
    }

    /// 查找 (row, col) 对应的值索引
    pub fn find_index(&self, row: usize, col: usize) -> Option<usize> {
        let start = self.row_ptr[row];
        self.row_indices(row)
            .binary_search(&col)
            .ok()
            .map(|k| start + k)
    }
}

// =============================================================================
// CSR 矩阵
// =============================================================================

/// CSR 稀疏矩阵
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    pattern: CsrPattern,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// 以零值创建
    pub fn from_pattern(pattern: CsrPattern) -> Self {
        let nnz = pattern.nnz();
        Self {
            pattern,
            values: vec![0.0; nnz],
        }
    }

    /// 行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.pattern.n_rows
    }

    /// 稀疏模式
    #[inline]
    pub fn pattern(&self) -> &CsrPattern {
        &self.pattern
    }

    /// 非零元值
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// 可变非零元值
    #[inline]
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// 读取元素（不存在返回 0）
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.pattern
            .find_index(row, col)
            .map_or(0.0, |k| self.values[k])
    }

    /// 在已有位置累加，位置不存在返回 false
    pub fn add(&mut self, row: usize, col: usize, value: f64) -> bool {
        match self.pattern.find_index(row, col) {
            Some(k) => {
                self.values[k] += value;
                true
            }
            None => false,
        }
    }

    /// 提取对角线
    pub fn extract_diagonal(&self) -> Vec<f64> {
        (0..self.n_rows()).map(|i| self.get(i, i)).collect()
    }

    /// y = A * x
    pub fn mul_vec(&self, x: &[f64], y: &mut [f64]) {
        let p = &self.pattern;
        for (row, yi) in y.iter_mut().enumerate().take(p.n_rows) {
            let (start, end) = (p.row_ptr[row], p.row_ptr[row + 1]);
            *yi = p.col_idx[start..end]
                .iter()
                .zip(&self.values[start..end])
                .map(|(&c, v)| v * x[c])
                .sum();
        }
    }

    /// 清零
    pub fn clear_values(&mut self) {
        self.values.fill(0.0);
    }
}

// =============================================================================
// 构建器
// =============================================================================

/// CSR 构建器（按行有序收集元素）
#[derive(Debug, Clone)]
pub struct CsrBuilder {
    n_rows: usize,
    rows: Vec<BTreeMap<usize, f64>>,
}

impl CsrBuilder {
    /// 方阵构建器
    pub fn new_square(n: usize) -> Self {
        Self {
            n_rows: n,
            rows: vec![BTreeMap::new(); n],
        }
    }

    /// 设置元素
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.rows[row].insert(col, value);
    }

    /// 累加元素
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        *self.rows[row].entry(col).or_insert(0.0) += value;
    }

    /// 只取稀疏模式
    pub fn build_pattern(&self) -> CsrPattern {
        let mut row_ptr = Vec::with_capacity(self.n_rows + 1);
        let mut col_idx = Vec::new();
        row_ptr.push(0);
        for row in &self.rows {
            col_idx.extend(row.keys().copied());
            row_ptr.push(col_idx.len());
        }
        CsrPattern {
            n_rows: self.n_rows,
            row_ptr,
            col_idx,
        }
    }

    /// 构建矩阵
    pub fn build(self) -> CsrMatrix {
        let pattern = self.build_pattern();
        let values = self.rows.into_iter().flat_map(|r| r.into_values()).collect();
        CsrMatrix { pattern, values }
    }
}
