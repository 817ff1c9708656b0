use std::{
    borrow::Cow,
    fmt::{Display, Formatter},
    path::{Component, Path},
};

/// Utility function to replace separators and convert to unicode (via to_string_lossy) on os path.
///
/// Root and prefix components are dropped, so the result is always a `/`-separated relative
/// string. `.` and `..` components are kept verbatim; run the result through
/// [`NotePath::normalize`] to resolve them.
pub fn os_path_to_string<P: AsRef<Path>>(os_path_ref: P) -> String {
    let res = os_path_ref
        .as_ref()
        .components()
        .filter_map(|c| match c {
            Component::RootDir | Component::Prefix(_) => None,
            _ => Some(c.as_os_str().to_string_lossy()),
        })
        .collect::<Vec<Cow<'_, str>>>()
        .join("/");
    tracing::trace!(
        "os_path_to_string: turned {:?} into {}",
        os_path_ref.as_ref(),
        res
    );
    res
}

/// A borrowed view over a `/`-separated, project-relative note path.
///
/// Splits a path into its directory, file name, stem and extension without allocating. Unlike
/// OS paths these never carry a drive prefix, and a leading `/` means "from the project root".
///
/// ```
/// # use zettel_core::paths::NotePath;
/// let path = NotePath::new("math/Lie Theory.typ");
/// assert_eq!(path.dir(), "math");
/// assert_eq!(path.filename(), "Lie Theory.typ");
/// assert_eq!(path.filestem(), "Lie Theory");
/// assert_eq!(path.ext(), "typ");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct NotePath<'a> {
    pub path: &'a str,
    /// Index of the last '/' separating the directory from the file name
    dir_sep: Option<usize>,
    /// Index of the '.' separating the file stem from the extension
    ext_sep: Option<usize>,
}

impl<'a> NotePath<'a> {
    pub fn new(path: &'a str) -> NotePath<'a> {
        let dir_sep = path.rfind('/');
        let filename_start = dir_sep.map(|sep| sep + 1).unwrap_or(0);
        let ext_sep = path[filename_start..]
            .rfind('.')
            // Hidden files (".notes") have no extension
            .filter(|dot_idx| *dot_idx != 0)
            .map(|dot_idx| dot_idx + filename_start);
        NotePath {
            path,
            dir_sep,
            ext_sep,
        }
    }

    /// Whether the path is anchored at the project root (leading `/`).
    pub fn is_rooted(&self) -> bool {
        self.path.starts_with('/')
    }

    pub fn dir(&self) -> &'a str {
        &self.path[0..self.dir_sep.unwrap_or(0)]
    }

    pub fn filename(&self) -> &'a str {
        &self.path[self.dir_sep.map(|idx| idx + 1).unwrap_or(0)..]
    }

    pub fn filestem(&self) -> &'a str {
        let start_idx = self.dir_sep.map(|idx| idx + 1).unwrap_or(0);
        let stop_idx = self.ext_sep.unwrap_or(self.path.len());
        &self.path[start_idx..stop_idx]
    }

    /// The extension without its leading dot, or `""` when there is none.
    pub fn ext(&self) -> &'a str {
        self.ext_sep
            .map(|idx| &self.path[idx + 1..])
            .unwrap_or("")
    }

    /// Resolve `end` against the directory of this path.
    ///
    /// A rooted `end` ignores this path entirely. The result is normalized; `None` means the
    /// joined path climbs above the project root.
    ///
    /// ```
    /// # use zettel_core::paths::NotePath;
    /// let from = NotePath::new("math/chart.typ");
    /// assert_eq!(from.join("./manifold.typ").as_deref(), Some("math/manifold.typ"));
    /// assert_eq!(from.join("../birds.typ").as_deref(), Some("birds.typ"));
    /// assert_eq!(from.join("/index.typ").as_deref(), Some("index.typ"));
    /// assert_eq!(from.join("../../outside.typ"), None);
    /// ```
    pub fn join<E: AsRef<str>>(&self, end_ref: E) -> Option<String> {
        let end = NotePath::new(end_ref.as_ref());
        if end.is_rooted() {
            return end.normalize();
        }
        let joined = if self.dir().is_empty() {
            end.path.to_string()
        } else {
            format!("{}/{}", self.dir(), end.path)
        };
        NotePath::new(&joined).normalize()
    }

    /// Resolve `.` and `..` components and strip any leading `/`.
    ///
    /// Returns `None` if a `..` would climb above the project root. Empty components (`a//b`)
    /// collapse.
    pub fn normalize(&self) -> Option<String> {
        let mut components = Vec::<&str>::new();
        for part in self.path.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    components.pop()?;
                }
                _ => components.push(part),
            }
        }
        Some(components.join("/"))
    }
}

impl AsRef<str> for NotePath<'_> {
    fn as_ref(&self) -> &str {
        self.path
    }
}

impl Display for NotePath<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)
    }
}
