//! Construction and accessor macros
//!
//! `props!` and `children!` keep node construction terse; the accessor macro
//! uses `paste` for identifier concatenation.

// =============================================================================
// Accessor generation
// =============================================================================

/// Generate `is_xxx` checks for enum variants.
///
/// Tuple variants take their field pattern in parentheses:
///
/// ```ignore
/// impl Tag {
///     impl_variant_checks!(Element(_), Text, Component(_), Fragment);
/// }
/// // Generates is_element, is_text, is_component, is_fragment
/// ```
#[macro_export]
macro_rules! impl_variant_checks {
    ($($variant:ident $(($($field:tt)*))?),* $(,)?) => {
        ::paste::paste! {
            $(
                #[doc = "Check if this is `" $variant "`"]
                #[inline]
                pub fn [<is_ $variant:snake>](&self) -> bool {
                    matches!(self, Self::$variant $(($($field)*))?)
                }
            )*
        }
    };
}

// =============================================================================
// Node construction
// =============================================================================

/// Build [`Props`](crate::Props) from `name => value` pairs.
///
/// ```ignore
/// let p = props! { "id" => "main", "onClick" => Handler::new(|_| {}) };
/// ```
#[macro_export]
macro_rules! props {
    () => {
        $crate::Props::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut props = $crate::Props::new();
        $(props.set($name, $value);)+
        props
    }};
}

/// Build a `Vec<Child>` from heterogeneous child expressions.
///
/// ```ignore
/// let kids = children!["label", 3, h("b", props! {}, ["bold"])];
/// ```
#[macro_export]
macro_rules! children {
    ($($child:expr),* $(,)?) => {
        vec![$($crate::Child::from($child)),*]
    };
}

#[cfg(test)]
mod tests {
    use crate::{Child, Value};

    #[derive(Debug)]
    enum Shape {
        Circle(f64),
        Square,
    }

    impl Shape {
        impl_variant_checks!(Circle(_), Square);
    }

    #[test]
    fn test_variant_checks() {
        assert!(Shape::Circle(1.0).is_circle());
        assert!(!Shape::Circle(1.0).is_square());
        assert!(Shape::Square.is_square());
    }

    #[test]
    fn test_props_macro() {
        let p = props! { "a" => 1, "b" => "two" };
        assert_eq!(p.get("a"), Some(&Value::Number(1.0)));
        assert_eq!(p.get("b"), Some(&Value::from("two")));
        assert!(props! {}.is_empty());
    }

    #[test]
    fn test_children_macro() {
        let kids = children!["a", 1, false, None::<&str>];
        assert_eq!(kids.len(), 4);
        assert!(matches!(kids[2], Child::Empty));
    }
}
