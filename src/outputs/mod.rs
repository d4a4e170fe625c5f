//! Output generation: the Markdown tree and the manifest that indexes it.
//!
//! # Submodules
//!
//! - [`tree`]: Creates, overwrites and clears the mirrored `.md` tree
//! - [`manifest`]: Renders and writes the `llms.txt` link manifest
//! - [`lock`]: Cross-process lock file held for the length of a run
//!
//! # Output Structure
//!
//! ```text
//! public/
//! ├── llms.txt              # manifest, sibling of the tree root
//! ├── llms.lock             # run lock
//! └── llms/
//!     ├── index.md          # https://example.com/
//!     ├── about.md          # https://example.com/about/
//!     └── 2025/
//!         └── 05/
//!             └── hello.md  # https://example.com/2025/05/hello/
//! ```

pub mod lock;
pub mod manifest;
pub mod tree;
