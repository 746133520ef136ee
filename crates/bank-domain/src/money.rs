use crate::BankError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cantidad decimal exacta con dos decimales, almacenada en centavos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
  pub const ZERO: Money = Money(0);

  pub const fn from_cents(cents: i64) -> Self {
    Money(cents)
  }

  /// Unidades enteras (por ejemplo `Money::from_units(1000)` = 1000.00).
  pub const fn from_units(units: i64) -> Self {
    Money(units * 100)
  }

  pub const fn cents(self) -> i64 {
    self.0
  }

  pub fn is_positive(self) -> bool {
    self.0 > 0
  }

  pub fn checked_add(self, other: Money) -> Option<Money> {
    self.0.checked_add(other.0).map(Money)
  }

  pub fn checked_sub(self, other: Money) -> Option<Money> {
    self.0.checked_sub(other.0).map(Money)
  }
}

impl fmt::Display for Money {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let sign = if self.0 < 0 { "-" } else { "" };
    let abs = self.0.unsigned_abs();
    write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
  }
}

impl FromStr for Money {
  type Err = BankError;

  /// Acepta `"100"`, `"100.5"`, `"100.50"` y un signo `-` opcional; un
  /// punto sin decimales (`"1."`) se rechaza.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let invalid = || BankError::Validation(format!("cantidad invalida: '{}'", s));
    let t = s.trim();
    let (negative, digits) = match t.strip_prefix('-') {
      Some(rest) => (true, rest),
      None => (false, t),
    };
    let (whole, frac) = match digits.split_once('.') {
      Some((_, "")) => return Err(invalid()),
      Some((w, f)) => (w, f),
      None => (digits, ""),
    };
    if whole.is_empty() || frac.len() > 2 || !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
      return Err(invalid());
    }
    let whole: i64 = whole.parse().map_err(|_| invalid())?;
    let frac: i64 = match frac.len() {
      0 => 0,
      1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
      _ => frac.parse().map_err(|_| invalid())?,
    };
    let cents = whole.checked_mul(100).and_then(|c| c.checked_add(frac)).ok_or_else(invalid)?;
    Ok(Money(if negative { -cents } else { cents }))
  }
}
