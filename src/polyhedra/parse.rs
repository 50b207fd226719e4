//! Constraint strings such as `"-x1 <= -0.02"`.
//!
//! Accepts `<=`, `>=`, `=` (and the `≤`/`≥` glyphs) between two linear
//! expressions. Monomials are `[signs] [number] [*] [identifier]`; runs of
//! signs fold, so `x - -0.5u` reads as `x + 0.5u`. Variables may appear on
//! both sides; everything is moved into `Σ cᵢ·vᵢ <= b` form.

use std::collections::BTreeMap;

use super::error::ParseError;
use super::term::{Term, Var};

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Rel(Relation),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Relation {
    Le,
    Ge,
    Eq,
}

/// Parse one constraint; equalities yield two terms.
pub fn parse_constraint(input: &str) -> Result<Vec<Term>, ParseError> {
    let tokens = tokenize(input)?;
    let rel_positions: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, (t, _))| matches!(t, Tok::Rel(_)))
        .map(|(i, _)| i)
        .collect();
    let split = match rel_positions.as_slice() {
        [one] => *one,
        [] => return Err(ParseError::new(input, input.len(), "missing relation")),
        [_, second, ..] => {
            return Err(ParseError::new(
                input,
                tokens[*second].1,
                "chained relations are not supported",
            ));
        }
    };
    let relation = match tokens[split].0 {
        Tok::Rel(rel) => rel,
        _ => unreachable!("split index points at a relation token"),
    };

    let (lhs_coeffs, lhs_const) = parse_expr(input, &tokens[..split], tokens[split].1)?;
    let (rhs_coeffs, rhs_const) = parse_expr(input, &tokens[split + 1..], input.len())?;

    let mut coeffs = lhs_coeffs;
    for (var, c) in rhs_coeffs {
        *coeffs.entry(var).or_insert(0.0) -= c;
    }
    let constant = rhs_const - lhs_const;
    let le = Term::new(coeffs.clone(), constant);
    let ge = Term::new(coeffs.into_iter().map(|(v, c)| (v, -c)), -constant);

    Ok(match relation {
        Relation::Le => vec![le],
        Relation::Ge => vec![ge],
        Relation::Eq => vec![le, ge],
    })
}

/// Parse many constraints into one flat list.
pub fn parse_constraints<S: AsRef<str>>(inputs: &[S]) -> Result<Vec<Term>, ParseError> {
    let mut out = Vec::with_capacity(inputs.len());
    for input in inputs {
        out.extend(parse_constraint(input.as_ref())?);
    }
    Ok(out)
}

fn tokenize(input: &str) -> Result<Vec<(Tok, usize)>, ParseError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0usize;
    while i < chars.len() {
        let (pos, ch) = chars[i];
        match ch {
            c if c.is_whitespace() => i += 1,
            '+' => {
                tokens.push((Tok::Plus, pos));
                i += 1;
            }
            '-' => {
                tokens.push((Tok::Minus, pos));
                i += 1;
            }
            '*' => {
                tokens.push((Tok::Star, pos));
                i += 1;
            }
            '≤' => {
                tokens.push((Tok::Rel(Relation::Le), pos));
                i += 1;
            }
            '≥' => {
                tokens.push((Tok::Rel(Relation::Ge), pos));
                i += 1;
            }
            '<' | '>' => {
                let rel = if ch == '<' { Relation::Le } else { Relation::Ge };
                match chars.get(i + 1) {
                    Some((_, '=')) => {
                        tokens.push((Tok::Rel(rel), pos));
                        i += 2;
                    }
                    _ => {
                        return Err(ParseError::new(
                            input,
                            pos,
                            "strict inequalities are not supported",
                        ));
                    }
                }
            }
            '=' => {
                tokens.push((Tok::Rel(Relation::Eq), pos));
                // tolerate `==`
                i += if matches!(chars.get(i + 1), Some((_, '='))) { 2 } else { 1 };
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                let mut end = i;
                while end < chars.len() && (chars[end].1.is_ascii_digit() || chars[end].1 == '.') {
                    end += 1;
                }
                // exponent only when digits follow, so `2e` keeps `e` as a variable
                if end < chars.len() && matches!(chars[end].1, 'e' | 'E') {
                    let mut ahead = end + 1;
                    if ahead < chars.len() && matches!(chars[ahead].1, '+' | '-') {
                        ahead += 1;
                    }
                    if ahead < chars.len() && chars[ahead].1.is_ascii_digit() {
                        end = ahead;
                        while end < chars.len() && chars[end].1.is_ascii_digit() {
                            end += 1;
                        }
                    }
                }
                let text: String = chars[start..end].iter().map(|(_, c)| *c).collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| ParseError::new(input, pos, format!("bad number `{text}`")))?;
                tokens.push((Tok::Num(value), pos));
                i = end;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                let mut end = i;
                while end < chars.len() && (chars[end].1.is_ascii_alphanumeric() || chars[end].1 == '_')
                {
                    end += 1;
                }
                let text: String = chars[start..end].iter().map(|(_, c)| *c).collect();
                tokens.push((Tok::Ident(text), pos));
                i = end;
            }
            other => {
                return Err(ParseError::new(
                    input,
                    pos,
                    format!("unexpected character `{other}`"),
                ));
            }
        }
    }
    Ok(tokens)
}

fn parse_expr(
    input: &str,
    tokens: &[(Tok, usize)],
    end_pos: usize,
) -> Result<(BTreeMap<Var, f64>, f64), ParseError> {
    if tokens.is_empty() {
        return Err(ParseError::new(input, end_pos, "expected expression"));
    }
    let mut coeffs: BTreeMap<Var, f64> = BTreeMap::new();
    let mut constant = 0.0;
    let mut i = 0usize;
    let mut first = true;

    while i < tokens.len() {
        let mut sign = 1.0;
        let mut saw_sign = false;
        while let Some((Tok::Plus | Tok::Minus, _)) = tokens.get(i) {
            if tokens[i].0 == Tok::Minus {
                sign = -sign;
            }
            saw_sign = true;
            i += 1;
        }
        if !first && !saw_sign {
            return Err(ParseError::new(input, tokens[i].1, "expected `+` or `-`"));
        }
        first = false;

        let here = tokens.get(i).map_or(end_pos, |(_, p)| *p);
        let mut number = None;
        if let Some((Tok::Num(v), _)) = tokens.get(i) {
            number = Some(*v);
            i += 1;
            if let Some((Tok::Star, _)) = tokens.get(i) {
                i += 1;
                if !matches!(tokens.get(i), Some((Tok::Ident(_), _))) {
                    let pos = tokens.get(i).map_or(end_pos, |(_, p)| *p);
                    return Err(ParseError::new(input, pos, "expected variable after `*`"));
                }
            }
        }
        match tokens.get(i) {
            Some((Tok::Ident(name), _)) => {
                *coeffs.entry(Var::new(name.clone())).or_insert(0.0) +=
                    sign * number.unwrap_or(1.0);
                i += 1;
            }
            _ => match number {
                Some(v) => constant += sign * v,
                None => return Err(ParseError::new(input, here, "expected number or variable")),
            },
        }
    }
    Ok((coeffs, constant))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(input: &str) -> Term {
        let mut terms = parse_constraint(input).unwrap();
        assert_eq!(terms.len(), 1, "{input}");
        terms.remove(0)
    }

    #[test]
    fn parses_bound() {
        let t = single("-x1 <= -0.02");
        assert_eq!(t.coefficient(&Var::new("x1")), -1.0);
        assert!((t.constant() + 0.02).abs() < 1e-15);
    }

    #[test]
    fn juxtaposed_coefficients_and_double_signs() {
        let t = single("y - -0.5u <= 3");
        assert_eq!(t.coefficient(&Var::new("u")), 0.5);
        assert_eq!(t.coefficient(&Var::new("y")), 1.0);
        let t = single("-y + 1.5e-1*u <= -2");
        assert!((t.coefficient(&Var::new("u")) - 0.15).abs() < 1e-15);
    }

    #[test]
    fn ge_flips_and_moves_terms() {
        // y >= 2u + 1  =>  -y + 2u <= -1
        let t = single("y >= 2 u + 1");
        assert_eq!(t.coefficient(&Var::new("y")), -1.0);
        assert_eq!(t.coefficient(&Var::new("u")), 2.0);
        assert_eq!(t.constant(), -1.0);
    }

    #[test]
    fn equality_gives_two_terms() {
        let terms = parse_constraint("x = 4").unwrap();
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].constant(), 4.0);
        assert_eq!(terms[1].constant(), -4.0);
    }

    #[test]
    fn display_round_trips() {
        let t = single("x1 - 0.25 u + 3 z <= 0.001");
        let again = single(&t.to_string());
        assert_eq!(t, again);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_constraint("x + y").is_err());
        assert!(parse_constraint("x < 2").is_err());
        assert!(parse_constraint("x <= 1 <= 2").is_err());
        assert!(parse_constraint("x y <= 2").is_err());
        assert!(parse_constraint("3 * <= 2").is_err());
        let err = parse_constraint("x <= ").unwrap_err();
        assert!(err.message.contains("expected expression"));
    }

    #[test]
    fn error_column_counts_characters() {
        // `≥` is three bytes wide; `<` is the 7th character
        let err = parse_constraint("x ≥ 1 < 2").unwrap_err();
        assert_eq!(err.column, 7);
        assert!(err.to_string().contains("at column 7"), "{err}");

        let err = parse_constraint("x + y").unwrap_err();
        assert_eq!(err.column, 6);
    }
}
