// crates/df_foundation/src/float.rs

//! 数值保护常量
//!
//! 分母保护统一使用 `SMALL`，速度/面积判零使用 `VSMALL`。

/// 分母保护量（与单精度无关的通用小量）
pub const SMALL: f64 = 1e-15;

/// 极小量，用于判断"严格为零"
pub const VSMALL: f64 = 1e-300;

/// 安全除法：分母加 `SMALL` 后相除
#[inline]
pub fn safe_div(num: f64, den: f64) -> f64 {
    num / (den + SMALL)
}

/// 单位阶跃函数：`x >= 0` 返回 1，否则 0
#[inline]
pub fn pos0(x: f64) -> f64 {
    if x >= 0.0 {
        1.0
    } else {
        0.0
    }
}

/// 严格正阶跃函数：`x > 0` 返回 1，否则 0
#[inline]
pub fn pos(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_div_zero_denominator() {
        let v = safe_div(1.0, 0.0);
        assert!(v.is_finite());
        assert!(v > 1e14);
    }

    #[test]
    fn test_step_functions() {
        assert_eq!(pos0(0.0), 1.0);
        assert_eq!(pos(0.0), 0.0);
        assert_eq!(pos(0.2), 1.0);
        assert_eq!(pos0(-0.2), 0.0);
    }
}
