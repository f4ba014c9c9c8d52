//! Field-level validation with pt-BR messages.
//!
//! Request DTOs implement [`Validate`] and push failures into a
//! [`FieldErrors`] collector. Every message is prefixed with the field name
//! (`"nome: não pode estar vazio"`) so clients can map it back to the form.

use std::fmt::Display;
use std::sync::LazyLock;

use regex::Regex;

use crate::ApiError;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Implemented by request bodies that carry rules beyond their serde shape.
pub trait Validate {
    fn validate(&self, errors: &mut FieldErrors);
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct FieldErrors {
    erros: Vec<String>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, campo: &str, mensagem: impl Display) {
        self.erros.push(format!("{campo}: {mensagem}"));
    }

    /// Pushes a message that is already complete.
    pub fn push_raw(&mut self, mensagem: impl Into<String>) {
        self.erros.push(mensagem.into());
    }

    pub fn required(&mut self, campo: &str, value: &str) {
        if value.trim().is_empty() {
            self.push(campo, "não pode estar vazio");
        }
    }

    /// `required` for optional fields of partial updates: absent is fine, blank is not.
    pub fn not_blank(&mut self, campo: &str, value: Option<&str>) {
        if let Some(v) = value {
            self.required(campo, v);
        }
    }

    pub fn max_len(&mut self, campo: &str, value: Option<&str>, max: usize) {
        if let Some(v) = value
            && v.chars().count() > max
        {
            self.push(campo, format!("deve ter no máximo {max} caracteres"));
        }
    }

    pub fn min_len(&mut self, campo: &str, value: Option<&str>, min: usize) {
        if let Some(v) = value
            && v.chars().count() < min
        {
            self.push(campo, format!("deve ter no mínimo {min} caracteres"));
        }
    }

    pub fn email(&mut self, campo: &str, value: Option<&str>) {
        if let Some(v) = value
            && !v.is_empty()
            && !EMAIL_RE.is_match(v)
        {
            self.push(campo, "deve ser um e-mail válido");
        }
    }

    /// Exact count of ASCII digits and nothing else.
    pub fn digits(&mut self, campo: &str, value: Option<&str>, len: usize) {
        if let Some(v) = value
            && (v.len() != len || !v.bytes().all(|b| b.is_ascii_digit()))
        {
            self.push(campo, format!("deve conter exatamente {len} dígitos"));
        }
    }

    /// Non-negative and small enough for a `NUMERIC(precision, scale)` column.
    pub fn numeric(&mut self, campo: &str, value: Option<f64>, precision: u32, scale: u32) {
        let Some(v) = value else {
            return;
        };
        if v < 0.0 {
            self.push(campo, "não pode ser negativo");
            return;
        }
        let inteiros = precision.saturating_sub(scale) as i32;
        let max = 10f64.powi(inteiros) - 10f64.powi(-(scale as i32));
        if !v.is_finite() || v > max {
            self.push(
                campo,
                format!("deve ser no máximo {max:.casas$}", casas = scale as usize),
            );
        }
    }

    pub fn range(&mut self, campo: &str, value: Option<i64>, min: i64, max: i64) {
        if let Some(v) = value
            && !(min..=max).contains(&v)
        {
            self.push(campo, format!("deve estar entre {min} e {max}"));
        }
    }

    pub fn matches(&mut self, campo: &str, value: Option<&str>, re: &Regex, mensagem: &str) {
        if let Some(v) = value
            && !re.is_match(v)
        {
            self.push(campo, mensagem);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.erros.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.erros
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        if self.erros.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation(self.erros))
        }
    }
}

/// Runs a DTO's rules and returns a 400 listing every failure.
pub fn validate<T: Validate + ?Sized>(value: &T) -> Result<(), ApiError> {
    let mut errors = FieldErrors::new();
    value.validate(&mut errors);
    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sample {
        nome: String,
        email: Option<String>,
        cpf: Option<String>,
        valor: Option<f64>,
    }

    impl Validate for Sample {
        fn validate(&self, errors: &mut FieldErrors) {
            errors.required("nome", &self.nome);
            errors.max_len("nome", Some(&self.nome), 10);
            errors.email("email", self.email.as_deref());
            errors.digits("cpf", self.cpf.as_deref(), 11);
            errors.numeric("valor", self.valor, 10, 2);
        }
    }

    #[test]
    fn collects_every_failure_in_order() {
        let sample = Sample {
            nome: "   ".into(),
            email: Some("sem-arroba".into()),
            cpf: Some("123".into()),
            valor: Some(-1.0),
        };
        let err = validate(&sample).unwrap_err();
        match err {
            ApiError::Validation(erros) => assert_eq!(
                erros,
                vec![
                    "nome: não pode estar vazio",
                    "email: deve ser um e-mail válido",
                    "cpf: deve conter exatamente 11 dígitos",
                    "valor: não pode ser negativo",
                ]
            ),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn valid_sample_passes() {
        let sample = Sample {
            nome: "Maria".into(),
            email: Some("maria@lab.com.br".into()),
            cpf: Some("12345678901".into()),
            valor: Some(0.0),
        };
        assert!(validate(&sample).is_ok());
    }

    #[test]
    fn numeric_respects_column_precision() {
        let mut errors = FieldErrors::new();
        errors.numeric("valor", Some(99_999_999.99), 10, 2);
        errors.numeric("valor", None, 10, 2);
        errors.numeric("percentual", Some(999.99), 5, 2);
        assert!(errors.is_empty());

        errors.numeric("valor", Some(1e9), 10, 2);
        errors.numeric("valor", Some(99_999_999.996), 10, 2);
        errors.numeric("percentual", Some(1000.0), 5, 2);
        errors.numeric("valor", Some(-0.01), 15, 2);
        errors.numeric("valor", Some(f64::INFINITY), 15, 2);
        assert_eq!(
            errors.as_slice(),
            [
                "valor: deve ser no máximo 99999999.99",
                "valor: deve ser no máximo 99999999.99",
                "percentual: deve ser no máximo 999.99",
                "valor: não pode ser negativo",
                "valor: deve ser no máximo 9999999999999.99",
            ]
        );
    }

    #[test]
    fn max_len_counts_characters_not_bytes() {
        let mut errors = FieldErrors::new();
        errors.max_len("nome", Some("ção"), 3);
        assert!(errors.is_empty());
        errors.max_len("nome", Some("ações"), 3);
        assert_eq!(errors.as_slice(), ["nome: deve ter no máximo 3 caracteres"]);
    }

    #[test]
    fn not_blank_ignores_absent_values() {
        let mut errors = FieldErrors::new();
        errors.not_blank("nome", None);
        assert!(errors.is_empty());
        errors.not_blank("nome", Some(""));
        assert!(!errors.is_empty());
    }
}
