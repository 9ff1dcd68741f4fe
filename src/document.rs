//! PDF document model.
//!
//! A [`PdfDocument`] is a read-only view over the bytes of one revision. It
//! answers the structural questions signing needs: where the catalog is,
//! which page objects exist and in what order, which form fields are already
//! present and whether an earlier certification forbids further changes.

use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::object::{Dict, Object, ObjectRef};
use crate::objstm::parse_object_stream;
use crate::parser::{find, parse_indirect_object_at};
use crate::signatures::SignatureField;
use crate::xref::{parse_xref, CrossRefTable, XRefEntry};
use std::collections::{HashMap, HashSet};

/// Maximum length of a reference chain followed by [`PdfDocument::resolve`].
const MAX_RESOLVE_DEPTH: usize = 32;

/// Maximum nesting of page tree and field tree nodes.
const MAX_TREE_DEPTH: usize = 64;

/// PDF document.
///
/// # Example
///
/// ```no_run
/// use pdf_seal::document::PdfDocument;
///
/// let bytes = std::fs::read("sample.pdf")?;
/// let mut doc = PdfDocument::open(&bytes, "")?;
/// println!("PDF version: {}.{}", doc.version().0, doc.version().1);
/// println!("Page count: {}", doc.page_count()?);
/// # Ok::<(), pdf_seal::error::Error>(())
/// ```
pub struct PdfDocument<'a> {
    /// Bytes of the revision
    data: &'a [u8],
    /// PDF version from the header (major, minor)
    version: (u8, u8),
    /// Merged cross-reference data
    xref: CrossRefTable,
    /// Loaded objects
    object_cache: HashMap<ObjectRef, Object>,
    /// Decoded object streams, keyed by stream object number
    object_streams: HashMap<u32, HashMap<u32, Object>>,
    /// Page refs, once walked
    pages: Option<Vec<ObjectRef>>,
}

impl std::fmt::Debug for PdfDocument<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("version", &self.version)
            .field("size", &self.data.len())
            .field("xref_entries", &self.xref.len())
            .field("cached_objects", &self.object_cache.len())
            .finish_non_exhaustive()
    }
}

impl<'a> PdfDocument<'a> {
    /// Open a document over the bytes of a revision.
    ///
    /// `password` is the document open-password. Encrypted documents are not
    /// supported, so it only affects the error reported for them.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPdf`] when there is no `%PDF-` header or no readable
    ///   cross-reference data
    /// - [`Error::UnsupportedConfiguration`] for encrypted documents
    pub fn open(data: &'a [u8], password: &str) -> Result<Self> {
        let version = parse_header(data)?;
        let xref = parse_xref(data)?;
        if xref.trailer().contains_key("Encrypt") {
            return Err(Error::UnsupportedConfiguration(if password.is_empty() {
                "encrypted documents cannot be signed".to_string()
            } else {
                "encrypted documents cannot be signed, even with an open password".to_string()
            }));
        }
        log::debug!(
            "Opened PDF {}.{} ({} bytes, {} xref entries)",
            version.0,
            version.1,
            data.len(),
            xref.len()
        );
        Ok(Self {
            data,
            version,
            xref,
            object_cache: HashMap::new(),
            object_streams: HashMap::new(),
            pages: None,
        })
    }

    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Raw bytes of the revision.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn xref(&self) -> &CrossRefTable {
        &self.xref
    }

    /// Trailer dictionary of the newest section.
    pub fn trailer(&self) -> &Dict {
        self.xref.trailer()
    }

    /// First object number free for an incremental update.
    pub fn next_object_number(&self) -> u32 {
        let size = self
            .trailer()
            .get("Size")
            .and_then(Object::as_integer)
            .and_then(|s| u32::try_from(s).ok())
            .unwrap_or(0);
        size.max(self.xref.max_object_number() + 1)
    }

    /// Load an indirect object.
    ///
    /// # Errors
    ///
    /// [`Error::ObjectNotFound`] for free or unknown object numbers, and parse
    /// errors for objects that cannot be read.
    pub fn load_object(&mut self, obj_ref: ObjectRef) -> Result<Object> {
        if let Some(cached) = self.object_cache.get(&obj_ref) {
            return Ok(cached.clone());
        }

        let object = match self.xref.get(obj_ref.id).copied() {
            Some(XRefEntry::InUse { offset, .. }) => {
                let (found, object) = parse_indirect_object_at(self.data, offset)?;
                if found.id != obj_ref.id {
                    return Err(Error::ParseError {
                        offset,
                        reason: format!("expected object {}, found {}", obj_ref.id, found.id),
                    });
                }
                object
            },
            Some(XRefEntry::Compressed { stream, .. }) => self.load_compressed_object(obj_ref, stream)?,
            Some(XRefEntry::Free) | None => return Err(Error::ObjectNotFound(obj_ref.id, obj_ref.gen)),
        };

        self.object_cache.insert(obj_ref, object.clone());
        Ok(object)
    }

    fn load_compressed_object(&mut self, obj_ref: ObjectRef, stream: u32) -> Result<Object> {
        if !self.object_streams.contains_key(&stream) {
            let stream_obj = match self.xref.get(stream).copied() {
                Some(XRefEntry::InUse { offset, .. }) => parse_indirect_object_at(self.data, offset)?.1,
                _ => return Err(Error::ObjectNotFound(stream, 0)),
            };
            log::debug!("Decoding object stream {}", stream);
            self.object_streams
                .insert(stream, parse_object_stream(&stream_obj)?);
        }
        self.object_streams
            .get(&stream)
            .and_then(|objects| objects.get(&obj_ref.id))
            .cloned()
            .ok_or(Error::ObjectNotFound(obj_ref.id, obj_ref.gen))
    }

    /// Follow references until a direct object is reached.
    pub fn resolve(&mut self, obj: &Object) -> Result<Object> {
        let mut current = obj.clone();
        for _ in 0..MAX_RESOLVE_DEPTH {
            if let Object::Reference(r) = current {
                current = self.load_object(r)?;
            } else {
                return Ok(current);
            }
        }
        Err(Error::InvalidPdf(format!(
            "reference chain longer than {} starting at {:?}",
            MAX_RESOLVE_DEPTH, obj
        )))
    }

    /// Resolve `obj` and require a dictionary (or stream dictionary).
    pub fn resolve_dict(&mut self, obj: &Object) -> Result<Dict> {
        let resolved = self.resolve(obj)?;
        resolved
            .as_dict()
            .cloned()
            .ok_or_else(|| Error::InvalidPdf(format!("expected Dictionary, found {}", resolved.type_name())))
    }

    /// Reference to the document catalog.
    pub fn catalog_ref(&self) -> Result<ObjectRef> {
        self.trailer()
            .get("Root")
            .ok_or_else(|| Error::InvalidPdf("Trailer missing /Root entry".to_string()))?
            .as_reference()
            .ok_or_else(|| Error::InvalidPdf("/Root is not a reference".to_string()))
    }

    pub fn catalog(&mut self) -> Result<Dict> {
        let root = self.catalog_ref()?;
        self.resolve_dict(&Object::Reference(root))
    }

    /// Page objects in document order.
    pub fn page_refs(&mut self) -> Result<Vec<ObjectRef>> {
        if let Some(pages) = &self.pages {
            return Ok(pages.clone());
        }
        let catalog = self.catalog()?;
        let root = catalog
            .get("Pages")
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::InvalidPdf("Catalog missing /Pages reference".to_string()))?;

        let mut refs = Vec::new();
        let mut visited = HashSet::new();
        self.collect_page_refs(root, 0, &mut visited, &mut refs)?;
        log::debug!("Page tree holds {} pages", refs.len());
        self.pages = Some(refs.clone());
        Ok(refs)
    }

    fn collect_page_refs(
        &mut self,
        node_ref: ObjectRef,
        depth: usize,
        visited: &mut HashSet<ObjectRef>,
        refs: &mut Vec<ObjectRef>,
    ) -> Result<()> {
        if depth > MAX_TREE_DEPTH {
            return Err(Error::InvalidPdf(format!("page tree deeper than {} levels", MAX_TREE_DEPTH)));
        }
        if !visited.insert(node_ref) {
            log::warn!("Circular reference in page tree at object {}, skipping", node_ref);
            return Ok(());
        }

        let node = self.resolve_dict(&Object::Reference(node_ref))?;
        let kids = node.get("Kids").and_then(Object::as_array);
        match (node.get("Type").and_then(Object::as_name), kids) {
            (Some("Pages"), Some(kids)) | (None, Some(kids)) => {
                for kid in kids {
                    match kid.as_reference() {
                        Some(kid_ref) => self.collect_page_refs(kid_ref, depth + 1, visited, refs)?,
                        None => log::warn!("Direct object in /Kids of {}, skipping", node_ref),
                    }
                }
            },
            (Some("Page"), _) | (None, None) => refs.push(node_ref),
            (other, _) => {
                log::warn!("Unknown page tree node type {:?} at {}", other, node_ref);
            },
        }
        Ok(())
    }

    pub fn page_count(&mut self) -> Result<u32> {
        Ok(self.page_refs()?.len() as u32)
    }

    /// Reference of the 1-based `page`.
    pub fn page_ref(&mut self, page: u32) -> Result<ObjectRef> {
        let pages = self.page_refs()?;
        page.checked_sub(1)
            .and_then(|index| pages.get(index as usize))
            .copied()
            .ok_or_else(|| Error::InvalidPage {
                selector: page.to_string(),
                total_pages: pages.len() as u32,
            })
    }

    /// 1-based page number of a page object.
    pub fn page_number(&mut self, page: ObjectRef) -> Result<Option<u32>> {
        Ok(self
            .page_refs()?
            .iter()
            .position(|r| *r == page)
            .map(|index| index as u32 + 1))
    }

    /// The interactive form dictionary and its reference, when indirect.
    pub fn acroform(&mut self) -> Result<Option<(Option<ObjectRef>, Dict)>> {
        let catalog = self.catalog()?;
        match catalog.get("AcroForm") {
            Some(Object::Reference(r)) => {
                let r = *r;
                Ok(Some((Some(r), self.resolve_dict(&Object::Reference(r))?)))
            },
            Some(Object::Dictionary(dict)) => Ok(Some((None, dict.clone()))),
            _ => Ok(None),
        }
    }

    /// Fully qualified names of every field in the form.
    pub fn field_names(&mut self) -> Result<HashSet<String>> {
        Ok(self.fields()?.into_iter().map(|field| field.name).collect())
    }

    /// Every signature field, in form order.
    pub fn signature_fields(&mut self) -> Result<Vec<SignatureField>> {
        let fields = self.fields()?;
        let mut signatures = Vec::new();
        for field in fields.into_iter().filter(|f| f.field_type.as_deref() == Some("Sig")) {
            let mut page = None;
            let mut rect = None;
            if let Some(widget_ref) = field.widget {
                let widget = self.resolve_dict(&Object::Reference(widget_ref))?;
                rect = widget.get("Rect").and_then(Rect::from_pdf_array);
                page = match widget.get("P").and_then(Object::as_reference) {
                    Some(page_ref) => self.page_number(page_ref)?,
                    None => None,
                };
                if page.is_none() {
                    page = self.page_holding_annotation(widget_ref)?;
                }
            }
            signatures.push(SignatureField {
                name: field.name,
                page,
                rect,
                widget: field.widget,
                signature: field.value,
            });
        }
        Ok(signatures)
    }

    /// Page whose `/Annots` lists `annot`.
    fn page_holding_annotation(&mut self, annot: ObjectRef) -> Result<Option<u32>> {
        let pages = self.page_refs()?;
        for (index, page_ref) in pages.into_iter().enumerate() {
            let page = self.resolve_dict(&Object::Reference(page_ref))?;
            let annots = match page.get("Annots") {
                Some(obj) => self.resolve(obj)?,
                None => continue,
            };
            let listed = annots
                .as_array()
                .is_some_and(|items| items.iter().any(|item| item.as_reference() == Some(annot)));
            if listed {
                return Ok(Some(index as u32 + 1));
            }
        }
        Ok(None)
    }

    fn fields(&mut self) -> Result<Vec<FormField>> {
        let roots = match self.acroform()? {
            Some((_, form)) => match form.get("Fields") {
                Some(fields) => self.resolve(fields)?.as_array().cloned().unwrap_or_default(),
                None => Vec::new(),
            },
            None => Vec::new(),
        };

        let mut out = Vec::new();
        let mut visited = HashSet::new();
        for root in roots {
            if let Some(r) = root.as_reference() {
                self.collect_fields(r, None, None, 0, &mut visited, &mut out)?;
            }
        }
        Ok(out)
    }

    fn collect_fields(
        &mut self,
        node_ref: ObjectRef,
        parent_name: Option<&str>,
        inherited_type: Option<&str>,
        depth: usize,
        visited: &mut HashSet<ObjectRef>,
        out: &mut Vec<FormField>,
    ) -> Result<()> {
        if depth > MAX_TREE_DEPTH || !visited.insert(node_ref) {
            log::warn!("Skipping repeated or too deep form field {}", node_ref);
            return Ok(());
        }
        let node = self.resolve_dict(&Object::Reference(node_ref))?;
        let partial = node.get("T").and_then(Object::as_text);
        let name = match (parent_name, partial.as_deref()) {
            (Some(parent), Some(partial)) => Some(format!("{}.{}", parent, partial)),
            (None, Some(partial)) => Some(partial.to_string()),
            (parent, None) => parent.map(str::to_string),
        };
        let field_type = node
            .get("FT")
            .and_then(Object::as_name)
            .or(inherited_type)
            .map(str::to_string);

        let kids: Vec<ObjectRef> = node
            .get("Kids")
            .and_then(Object::as_array)
            .map(|kids| kids.iter().filter_map(Object::as_reference).collect())
            .unwrap_or_default();

        // Kids without /T are widgets of this field
        let mut widgets = Vec::new();
        let mut child_fields = Vec::new();
        for kid in kids {
            let kid_dict = self.resolve_dict(&Object::Reference(kid))?;
            if kid_dict.contains_key("T") {
                child_fields.push(kid);
            } else {
                widgets.push(kid);
            }
        }

        if partial.is_some() {
            let is_widget = node.get("Subtype").and_then(Object::as_name) == Some("Widget");
            out.push(FormField {
                name: name.clone().unwrap_or_default(),
                field_type: field_type.clone(),
                widget: if is_widget { Some(node_ref) } else { widgets.first().copied() },
                value: node.get("V").and_then(Object::as_reference),
            });
        }
        for child in child_fields {
            self.collect_fields(child, name.as_deref(), field_type.as_deref(), depth + 1, visited, out)?;
        }
        Ok(())
    }

    /// DocMDP `/P` of the certification signature, if the document is certified.
    pub fn certification_permission(&mut self) -> Result<Option<i64>> {
        let catalog = self.catalog()?;
        let sig_obj = match catalog.get("Perms") {
            Some(perms) => match self.resolve_dict(perms)?.get("DocMDP") {
                Some(sig) => sig.clone(),
                None => return Ok(None),
            },
            None => return Ok(None),
        };
        let sig = self.resolve_dict(&sig_obj)?;
        self.docmdp_permission_of(&sig)
    }

    /// DocMDP `/P` declared by a signature dictionary's `/Reference` entries.
    pub fn docmdp_permission_of(&mut self, sig: &Dict) -> Result<Option<i64>> {
        let references = match sig.get("Reference") {
            Some(obj) => self.resolve(obj)?.as_array().cloned().unwrap_or_default(),
            None => return Ok(None),
        };
        for reference in references {
            let reference = self.resolve_dict(&reference)?;
            if reference.get("TransformMethod").and_then(Object::as_name) != Some("DocMDP") {
                continue;
            }
            let permission = match reference.get("TransformParams") {
                Some(params) => self.resolve_dict(params)?.get("P").and_then(Object::as_integer),
                None => None,
            };
            return Ok(Some(permission.unwrap_or(2)));
        }
        Ok(None)
    }
}

/// A terminal or intermediate field with a partial name.
#[derive(Debug, Clone)]
struct FormField {
    name: String,
    field_type: Option<String>,
    widget: Option<ObjectRef>,
    value: Option<ObjectRef>,
}

/// Parse the `%PDF-x.y` header within the first kilobyte.
pub fn parse_header(data: &[u8]) -> Result<(u8, u8)> {
    let window = &data[..data.len().min(1024)];
    let start = find(window, b"%PDF-").ok_or_else(|| Error::InvalidPdf("missing %PDF- header".to_string()))?;
    let rest = &window[start + 5..];
    let major = rest.first().filter(|c| c.is_ascii_digit()).map(|c| c - b'0');
    let minor = rest.get(2).filter(|c| c.is_ascii_digit()).map(|c| c - b'0');
    match (major, rest.get(1), minor) {
        (Some(major), Some(b'.'), Some(minor)) => Ok((major, minor)),
        _ => Err(Error::InvalidPdf("malformed %PDF- header".to_string())),
    }
}
