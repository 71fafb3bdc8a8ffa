//! Synthetic PDFs for tests.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

#[derive(Debug, Clone)]
enum PageBody {
    Lines(Vec<String>),
    Raw(String),
    Form(String),
    Empty,
}

/// One page of a [`PdfFixture`].
#[derive(Debug, Clone)]
pub struct FixturePage {
    body: PageBody,
    link_to: Option<usize>,
}

impl FixturePage {
    /// Helvetica 12pt, one text line per entry, 14pt leading.
    pub fn lines(lines: &[&str]) -> Self {
        Self { body: PageBody::Lines(lines.iter().map(|line| (*line).to_owned()).collect()), link_to: None }
    }

    /// Raw content stream; `/F1` is available.
    pub fn raw(content: &str) -> Self {
        Self { body: PageBody::Raw(content.to_owned()), link_to: None }
    }

    /// Page that draws a form XObject translated by (100, 200).
    pub fn with_form(form_content: &str) -> Self {
        Self { body: PageBody::Form(form_content.to_owned()), link_to: None }
    }

    pub fn empty() -> Self {
        Self { body: PageBody::Empty, link_to: None }
    }

    /// Adds a link annotation whose destination is another page of the fixture.
    pub fn linking_to(mut self, page_index: usize) -> Self {
        self.link_to = Some(page_index);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct PdfFixture {
    pages: Vec<FixturePage>,
    title: Option<String>,
    compress: bool,
    font: Option<Dictionary>,
    encrypt: bool,
}

impl PdfFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: FixturePage) -> Self {
        self.pages.push(page);
        self
    }

    /// Convenience: one page per entry, each a single line of text.
    pub fn text_pages(texts: &[&str]) -> Self {
        texts.iter().fold(Self::new(), |fixture, text| fixture.page(FixturePage::lines(&[text])))
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_owned());
        self
    }

    pub fn compressed(mut self) -> Self {
        self.compress = true;
        self
    }

    /// Replace the default Helvetica behind `/F1`.
    pub fn font(mut self, font: Dictionary) -> Self {
        self.font = Some(font);
        self
    }

    /// Adds a standard security handler `/Encrypt` entry to the trailer.
    pub fn encrypted(mut self) -> Self {
        self.encrypt = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(self.font.clone().unwrap_or_else(|| {
            dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
            }
        }));

        let page_ids: Vec<ObjectId> = self.pages.iter().map(|_| doc.new_object_id()).collect();

        for (page, page_id) in self.pages.iter().zip(&page_ids) {
            let mut page_dict = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
            };

            match &page.body {
                PageBody::Lines(lines) => {
                    let content = lines_content(lines);
                    page_dict.set("Contents", doc.add_object(Stream::new(Dictionary::new(), content)));
                }
                PageBody::Raw(content) => {
                    let stream = Stream::new(Dictionary::new(), content.as_bytes().to_vec());
                    page_dict.set("Contents", doc.add_object(stream));
                }
                PageBody::Form(form_content) => {
                    let form = Stream::new(
                        dictionary! {
                            "Type" => "XObject",
                            "Subtype" => "Form",
                            "BBox" => vec![0.into(), 0.into(), 200.into(), 200.into()],
                            "Matrix" => vec![1.into(), 0.into(), 0.into(), 1.into(), 100.into(), 200.into()],
                            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
                        },
                        form_content.as_bytes().to_vec(),
                    );
                    let form_id = doc.add_object(form);
                    page_dict.set(
                        "Resources",
                        dictionary! {
                            "Font" => dictionary! { "F1" => font_id },
                            "XObject" => dictionary! { "Fm1" => form_id },
                        },
                    );
                    let stream = Stream::new(Dictionary::new(), b"q /Fm1 Do Q".to_vec());
                    page_dict.set("Contents", doc.add_object(stream));
                }
                PageBody::Empty => {}
            }

            if let Some(target) = page.link_to.and_then(|index| page_ids.get(index)) {
                let link = doc.add_object(dictionary! {
                    "Type" => "Annot",
                    "Subtype" => "Link",
                    "Rect" => vec![0.into(), 0.into(), 50.into(), 50.into()],
                    "Dest" => vec![Object::Reference(*target), "Fit".into()],
                });
                page_dict.set("Annots", vec![Object::Reference(link)]);
            }

            doc.objects.insert(*page_id, Object::Dictionary(page_dict));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
                "Count" => page_ids.len() as i64,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        if let Some(title) = &self.title {
            let info_id = doc.add_object(dictionary! { "Title" => Object::string_literal(title.as_str()) });
            doc.trailer.set("Info", info_id);
        }

        if self.compress {
            doc.compress();
        }

        if self.encrypt {
            let key = Object::String(vec![0x5a; 32], lopdf::StringFormat::Hexadecimal);
            doc.trailer.set(
                "Encrypt",
                dictionary! {
                    "Filter" => "Standard",
                    "V" => 1,
                    "R" => 2,
                    "Length" => 40,
                    "O" => key.clone(),
                    "U" => key,
                    "P" => -4,
                },
            );
            let id = Object::String(vec![0x11; 16], lopdf::StringFormat::Hexadecimal);
            doc.trailer.set("ID", vec![id.clone(), id]);
        }

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).expect("fixture PDF should serialize");
        buffer
    }
}

fn lines_content(lines: &[String]) -> Vec<u8> {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12.into()]),
        Operation::new("TL", vec![14.into()]),
        Operation::new("Td", vec![72.into(), 720.into()]),
    ];

    for (index, line) in lines.iter().enumerate() {
        if index > 0 {
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new("Tj", vec![Object::string_literal(line.as_str())]));
    }
    operations.push(Operation::new("ET", vec![]));

    Content { operations }.encode().expect("fixture content should encode")
}
