//! 订单号校验
//!
//! 订单号是十进制数字串，必须能放入 u64 并通过 Luhn 校验。
//! 所有接收订单号的入口（登记订单、提现）都经过这里。

/// 校验订单号
///
/// 空串、非数字字符（包括 `+` 前缀和空白）以及超出 u64 范围的输入一律返回 false。
pub fn is_valid(number: &str) -> bool {
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if number.parse::<u64>().is_err() {
        return false;
    }
    checksum(number) % 10 == 0
}

/// Luhn 加权和：从最低位开始，每隔一位乘 2，乘积大于 9 时减 9
fn checksum(digits: &str) -> u32 {
    digits
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let d = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum()
}
