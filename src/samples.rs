//! Sample course markdown for testing and demonstration.
//!
//! Each sample exercises a different part of the pipeline: normalization
//! fix-ups, highlighted code, tables, long content that spans pages.

/// Lesson with generic types in prose and lists glued to paragraphs.
pub fn generics_lesson() -> &'static str {
    r#"# Generics in Rust

A `Vec<T>` holds values of one type. Outside code, Vec<String> and Option<T>
must survive the trip through HTML.
Things to remember:
- Type parameters are written in angle brackets
- Bounds restrict what a parameter can do
- Result<T, E> is generic over two types

## Trait bounds

Use a bound when the body calls a trait method:
1. Declare the parameter
2. Add `T: Display`
3. Call the method

```rust
fn largest<T: PartialOrd + Copy>(list: &[T]) -> T {
    let mut largest = list[0];
    for &item in list {
        if item > largest {
            largest = item;
        }
    }
    largest
}
```
"#
}

/// Lesson with a table, a blockquote, and a fenced block in an unknown
/// language.
pub fn ownership_lesson() -> &'static str {
    r#"# Ownership

> Each value in Rust has exactly one owner.

| Operation | Moves? | Notes |
|-----------|--------|-------|
| `let b = a` | yes | for non-`Copy` types |
| `&a` | no | shared borrow |
| `&mut a` | no | exclusive borrow |

**Bold claim:** the borrow checker is *your friend*.

```text
owner ──▶ value
```

---

See the [book](https://doc.rust-lang.org/book/) for more.
"#
}

/// Minimal sample for unit testing.
pub fn minimal_lesson() -> &'static str {
    "# Hello\n\nThis is a paragraph."
}

/// Long lesson that spans several pages.
pub fn long_lesson() -> String {
    let mut md = String::from("# Exercises\n\n");
    for i in 1..=40 {
        md.push_str(&format!(
            "## Exercise {i}\n\nWrite a function that takes a `&str` and returns the number of \
             words. Handle leading and trailing whitespace, and treat tabs as separators.\n\n\
             ```python\ndef count_words(s):\n    return len(s.split())\n```\n\n"
        ));
    }
    md
}

/// `(file name, markdown)` pairs forming a small course directory.
pub fn course() -> Vec<(&'static str, String)> {
    vec![
        ("01-generics.md", generics_lesson().to_string()),
        ("02-ownership.md", ownership_lesson().to_string()),
        ("03-exercises.md", long_lesson()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::convert_markdown;

    #[test]
    fn samples_convert_to_html() {
        for (name, md) in course() {
            let converted = convert_markdown(&md);
            assert!(
                converted.first_h1().is_some(),
                "Sample '{}' should have a top-level heading",
                name
            );
        }
        assert!(convert_markdown(minimal_lesson()).html.contains("<h1"));
    }
}
