use std::{
    collections::HashMap,
    sync::{Arc, OnceLock, RwLock},
};

use facet_core::{ConstTypeId, Field, FieldAttribute, FieldFlags, Shape, StructType};

use crate::kind::{Kind, strip_wrappers};

/// A member of a struct, as addressed by a path segment.
#[derive(Debug, Clone)]
pub struct Member {
    /// Declared shape of the member (wrappers included).
    pub shape: &'static Shape,
    /// Field indices leading from the struct to the member. Longer than one
    /// entry for members promoted out of `#[facet(flatten)]` fields.
    pub path: Vec<usize>,
}

/// Exposed name → member, for one struct type.
pub type Members = HashMap<String, Member>;

/// How per-field form annotations are spelled.
///
/// With the default syntax, `#[facet(form = "name")]` exposes a field as
/// `name` and `#[facet(form = "-")]` hides it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationSyntax {
    /// Attribute key, `form` by default.
    pub key: String,
    /// Separator between the name and any trailing options, `,` by default.
    pub delimiter: String,
    /// Name that excludes the field, `-` by default.
    pub ignore: String,
}

impl Default for AnnotationSyntax {
    fn default() -> Self {
        AnnotationSyntax {
            key: "form".to_string(),
            delimiter: ",".to_string(),
            ignore: "-".to_string(),
        }
    }
}

/// What an annotation says about a field.
#[derive(Debug, PartialEq, Eq)]
enum Annotation<'a> {
    Rename(&'a str),
    Ignore,
}

impl AnnotationSyntax {
    /// Parses `key = "value"` out of an arbitrary attribute. The derive macro
    /// stringifies tokens, so spacing around `=` is not reliable.
    fn parse<'a>(&self, attribute: &'a str) -> Option<Annotation<'a>> {
        let rest = attribute.trim().strip_prefix(self.key.as_str())?;
        let rest = rest.trim_start().strip_prefix('=')?.trim();
        let value = rest.strip_prefix('"')?.strip_suffix('"')?;
        let name = value.split(self.delimiter.as_str()).next().unwrap_or("");
        if name == self.ignore {
            Some(Annotation::Ignore)
        } else if name.is_empty() {
            None
        } else {
            Some(Annotation::Rename(name))
        }
    }

    /// Name under which `field` is addressed, `None` if it is excluded.
    fn exposed_name(&self, field: &Field) -> Option<String> {
        for FieldAttribute::Arbitrary(content) in field.attributes {
            match self.parse(content) {
                Some(Annotation::Ignore) => return None,
                Some(Annotation::Rename(name)) => return Some(name.to_string()),
                None => {}
            }
        }
        Some(field.name.to_string())
    }
}

/// Memoizes the addressable members of struct types.
///
/// Entries are computed once per type and never invalidated. Lookups from
/// several threads are fine: a miss is computed outside the lock and the first
/// insert wins, so racing threads all end up sharing one entry.
#[derive(Debug, Default)]
pub struct ShapeCache {
    syntax: AnnotationSyntax,
    data: RwLock<HashMap<ConstTypeId, Arc<Members>>>,
}

impl ShapeCache {
    /// Creates an empty cache using the default annotation syntax.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cache with a custom annotation syntax.
    pub fn with_syntax(syntax: AnnotationSyntax) -> Self {
        ShapeCache {
            syntax,
            data: RwLock::default(),
        }
    }

    /// The process-wide cache used by [`crate::Decoder::new`].
    pub fn global() -> Arc<ShapeCache> {
        static GLOBAL: OnceLock<Arc<ShapeCache>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(ShapeCache::new())).clone()
    }

    /// Annotation syntax this cache reads.
    pub fn syntax(&self) -> &AnnotationSyntax {
        &self.syntax
    }

    /// Members of a struct shape. Non-struct shapes have no members.
    ///
    /// `shape` is looked up as given; callers strip `Option`/pointer layers
    /// first.
    pub fn members(&self, shape: &'static Shape) -> Arc<Members> {
        if let Some(members) = self
            .data
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&shape.id)
        {
            return members.clone();
        }

        log::trace!("Computing members of {shape}");
        let computed = Arc::new(self.compute(shape));

        self.data
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(shape.id)
            .or_insert(computed)
            .clone()
    }

    /// Resolves `path` against `root`, returning the leaf type with its
    /// wrappers stripped.
    ///
    /// Struct segments must name a member. Map, list and array segments are
    /// taken as keys/indices without looking at them; they are checked while
    /// packing.
    pub fn resolve<S: AsRef<str>>(&self, root: &'static Shape, path: &[S]) -> Option<&'static Shape> {
        let mut shape = root;
        for segment in path {
            shape = strip_wrappers(shape);
            shape = match Kind::of(shape) {
                Kind::Record(_) => self.members(shape).get(segment.as_ref())?.shape,
                Kind::Mapping(map_def) => map_def.v(),
                Kind::Sequence(list_def) => list_def.t(),
                Kind::Array(array_def) => array_def.t,
                Kind::Scalar => return None,
            };
        }
        Some(strip_wrappers(shape))
    }

    fn compute(&self, shape: &'static Shape) -> Members {
        let mut found: HashMap<String, (usize, Member)> = HashMap::new();
        if let Kind::Record(struct_type) = Kind::of(shape) {
            self.collect(struct_type, &[], 0, &mut found);
        }
        found
            .into_iter()
            .map(|(name, (_, member))| (name, member))
            .collect()
    }

    /// Depth-first walk over fields and flattened fields. Shallower names
    /// hide deeper ones; at equal depth the first declared wins.
    fn collect(
        &self,
        struct_type: StructType,
        prefix: &[usize],
        depth: usize,
        found: &mut HashMap<String, (usize, Member)>,
    ) {
        for (index, field) in struct_type.fields.iter().enumerate() {
            let mut path = prefix.to_vec();
            path.push(index);

            if let Some(name) = self.syntax.exposed_name(field) {
                let hidden = found
                    .get(&name)
                    .is_some_and(|(existing, _)| *existing <= depth);
                if !hidden {
                    found.insert(
                        name,
                        (
                            depth,
                            Member {
                                shape: field.shape(),
                                path: path.clone(),
                            },
                        ),
                    );
                }
            }

            if field.flags.contains(FieldFlags::FLATTEN) {
                if let Kind::Record(inner) = Kind::of(field.shape()) {
                    self.collect(inner, &path, depth + 1, found);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet::Facet;

    #[test]
    fn annotation_parsing() {
        let syntax = AnnotationSyntax::default();
        assert_eq!(syntax.parse(r#"form = "h""#), Some(Annotation::Rename("h")));
        assert_eq!(syntax.parse(r#"form="h,omitempty""#), Some(Annotation::Rename("h")));
        assert_eq!(syntax.parse(r#"form = "-""#), Some(Annotation::Ignore));
        assert_eq!(syntax.parse(r#"form = "-,x""#), Some(Annotation::Ignore));
        assert_eq!(syntax.parse(r#"form = """#), None);
        assert_eq!(syntax.parse(r#"form = ",x""#), None);
        assert_eq!(syntax.parse("form"), None);
        assert_eq!(syntax.parse(r#"form = h"#), None);
        assert_eq!(syntax.parse("child"), None);
    }

    #[test]
    fn custom_syntax() {
        let syntax = AnnotationSyntax {
            key: "query".to_string(),
            delimiter: ";".to_string(),
            ignore: "skip".to_string(),
        };
        assert_eq!(syntax.parse(r#"query = "a;b""#), Some(Annotation::Rename("a")));
        assert_eq!(syntax.parse(r#"query = "skip""#), Some(Annotation::Ignore));
        assert_eq!(syntax.parse(r#"form = "a""#), None);
    }

    #[test]
    fn flattened_members_are_promoted_and_shadowed() {
        #[derive(Facet)]
        struct Inner {
            a: i32,
            s: String,
        }

        #[derive(Facet)]
        struct Outer {
            #[facet(flatten)]
            inner: Inner,
            s: String,
        }

        let cache = ShapeCache::new();
        let members = cache.members(Outer::SHAPE);

        assert_eq!(members["inner"].path, vec![0]);
        assert_eq!(members["a"].path, vec![0, 0]);
        assert_eq!(members["s"].path, vec![1]);
        assert!(members["a"].shape.is_type::<i32>());
    }

    #[test]
    fn members_are_memoized() {
        #[derive(Facet)]
        struct Point {
            x: i32,
            y: i32,
        }

        let cache = ShapeCache::new();
        let first = cache.members(Point::SHAPE);
        let second = cache.members(Point::SHAPE);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn resolve_walks_containers() {
        #[derive(Facet)]
        struct Leaf {
            value: Option<u8>,
        }

        #[derive(Facet)]
        struct Root {
            items: Vec<Leaf>,
            by_name: std::collections::HashMap<String, Box<Leaf>>,
            fixed: [u16; 2],
            count: u32,
        }

        let cache = ShapeCache::new();
        let root = Root::SHAPE;

        let leaf = cache.resolve(root, &["items", "7", "value"]).unwrap();
        assert!(leaf.is_type::<u8>());

        let leaf = cache.resolve(root, &["by_name", "anything", "value"]).unwrap();
        assert!(leaf.is_type::<u8>());

        let leaf = cache.resolve(root, &["fixed", "not-checked-here"]).unwrap();
        assert!(leaf.is_type::<u16>());

        let leaf = cache.resolve(root, &["items"]).unwrap();
        assert!(leaf.is_type::<Vec<Leaf>>());

        assert!(cache.resolve(root, &["missing"]).is_none());
        assert!(cache.resolve(root, &["count", "deeper"]).is_none());
        assert!(cache.resolve(<Option<Root>>::SHAPE, &["count"]).is_some());
    }
}
