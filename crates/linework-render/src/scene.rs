//! Backend-neutral description of what an export draws.

use kurbo::{Affine, Point, Rect};
use linework_core::assets::{AssetProvider, IconArt, PictureFormat};
use linework_core::entities::{Anchor, Colour, Entity, IconEntity, LabelEntity, LineCap, LineEntity, LineJoin};
use linework_core::icons::{BuiltinIcon, Primitive};
use linework_core::{Document, EntityId};

/// Margin around the content when exporting [`ExportArea::Content`].
pub const DEFAULT_MARGIN: f64 = 20.0;

/// Which part of the document becomes the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportArea {
    /// The document's canvas rectangle.
    #[default]
    Canvas,
    /// The bounds of visible content plus a margin.
    Content,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneOptions {
    pub area: ExportArea,
    pub margin: f64,
    /// Draw the grid when the document shows one.
    pub grid: bool,
    /// Fill the page with the canvas background.
    pub background: bool,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            area: ExportArea::Canvas,
            margin: DEFAULT_MARGIN,
            grid: true,
            background: true,
        }
    }
}

/// Grid lines covering the page.
#[derive(Debug, Clone, PartialEq)]
pub struct GridLines {
    pub spacing: f64,
    pub colour: Colour,
}

/// One drawable element, in document coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneItem {
    Path {
        id: EntityId,
        points: Vec<Point>,
        colour: Colour,
        width: f64,
        /// Empty when solid.
        dash: Vec<f64>,
        dash_offset: f64,
        cap: LineCap,
        join: LineJoin,
    },
    Text {
        id: EntityId,
        text: String,
        position: Point,
        font_size: f64,
        rotation: f64,
        colour: Colour,
        anchor: Anchor,
    },
    /// Built-in icon primitives placed by `transform` (viewbox to document).
    Symbol {
        id: EntityId,
        transform: Affine,
        primitives: Vec<Primitive>,
        colour: Colour,
    },
    /// Imported picture filling `rect` rotated about its centre. `data` is
    /// `None` when the asset could not be loaded and a placeholder is drawn.
    Picture {
        id: EntityId,
        rect: Rect,
        rotation: f64,
        data: Option<(Vec<u8>, PictureFormat)>,
    },
}

/// Everything an exporter needs, resolved from a document snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    /// Exported region in document coordinates.
    pub page: Rect,
    pub background: Option<Colour>,
    pub grid: Option<GridLines>,
    /// Back to front.
    pub items: Vec<SceneItem>,
}

impl Scene {
    /// Walk `doc` in paint order, skipping hidden entities and groups.
    pub fn build(doc: &Document, assets: &dyn AssetProvider, options: &SceneOptions) -> Self {
        let canvas = doc.canvas();
        let page = match options.area {
            ExportArea::Canvas => canvas.rect(),
            ExportArea::Content => doc
                .content_bounds()
                .map(|b| b.inflate(options.margin, options.margin))
                .unwrap_or_else(|| canvas.rect()),
        };
        let page = ensure_area(page);

        let grid = doc.grid();
        let grid = (options.grid && grid.visible && grid.spacing > 0.0).then(|| GridLines {
            spacing: grid.spacing,
            colour: grid.colour,
        });

        let items = doc
            .all()
            .filter(|e| e.is_visible())
            .filter_map(|e| match e {
                Entity::Line(line) => Some(line_item(line)),
                Entity::Label(label) => Some(text_item(label)),
                Entity::Icon(icon) => Some(icon_item(icon, assets)),
                Entity::Group(_) => None,
            })
            .collect();

        Self {
            page,
            background: options.background.then_some(canvas.background),
            grid,
            items,
        }
    }

    pub fn width(&self) -> f64 {
        self.page.width()
    }

    pub fn height(&self) -> f64 {
        self.page.height()
    }
}

fn ensure_area(page: Rect) -> Rect {
    let page = page.abs();
    Rect::new(
        page.x0,
        page.y0,
        page.x1.max(page.x0 + 1.0),
        page.y1.max(page.y0 + 1.0),
    )
}

fn line_item(line: &LineEntity) -> SceneItem {
    SceneItem::Path {
        id: line.meta.id,
        points: line.points.clone(),
        colour: line.style.stroke_colour,
        width: line.style.stroke_width,
        dash: line.style.dash_array(),
        dash_offset: line.style.dash_offset,
        cap: line.cap,
        join: line.join,
    }
}

fn text_item(label: &LabelEntity) -> SceneItem {
    SceneItem::Text {
        id: label.meta.id,
        text: label.text.clone(),
        position: label.position,
        font_size: label.font_size,
        rotation: label.rotation,
        colour: label.colour,
        anchor: label.anchor,
    }
}

fn icon_item(icon: &IconEntity, assets: &dyn AssetProvider) -> SceneItem {
    let id = icon.meta.id;
    let data = match assets.resolve(&icon.icon) {
        Ok(IconArt::Vector(builtin)) => {
            let transform = Affine::translate(icon.position.to_vec2())
                * Affine::rotate(icon.rotation.to_radians())
                * Affine::scale(BuiltinIcon::scale_for(icon.extent()));
            return SceneItem::Symbol {
                id,
                transform,
                primitives: builtin.primitives(),
                colour: icon.style.stroke_colour,
            };
        }
        Ok(IconArt::Picture { bytes, format }) => Some((bytes, format)),
        Err(e) => {
            log::warn!("Drawing placeholder for icon {id}: {e}");
            None
        }
    };
    SceneItem::Picture {
        id,
        rect: icon.local_box(),
        rotation: icon.rotation,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linework_core::entities::{GroupEntity, IconRef, Style};
    use linework_core::{Command, MemoryAssetProvider};

    fn doc_with(entities: Vec<Entity>) -> Document {
        let mut doc = Document::new();
        Command::add(entities).apply(&mut doc).unwrap();
        doc
    }

    #[test]
    fn test_items_follow_paint_order_and_skip_hidden() {
        let a = LineEntity::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0), Style::default());
        let mut hidden = LineEntity::new(Point::new(0.0, 5.0), Point::new(10.0, 5.0), Style::default());
        hidden.meta.visible = false;
        let label = LabelEntity::new(Point::new(5.0, 5.0), "A");
        let (a_id, label_id) = (a.meta.id, label.meta.id);
        let group = GroupEntity::new(vec![a_id, label_id]);
        let doc = doc_with(vec![a.into(), hidden.into(), label.into(), group.into()]);

        let scene = Scene::build(&doc, &MemoryAssetProvider::new(), &SceneOptions::default());
        let ids: Vec<_> = scene
            .items
            .iter()
            .map(|item| match item {
                SceneItem::Path { id, .. }
                | SceneItem::Text { id, .. }
                | SceneItem::Symbol { id, .. }
                | SceneItem::Picture { id, .. } => *id,
            })
            .collect();
        assert_eq!(ids, vec![a_id, label_id]);
        assert_eq!(scene.page, Rect::new(0.0, 0.0, 600.0, 600.0));
        assert!(scene.grid.is_some());
        assert_eq!(scene.background, Some(Colour::white()));
    }

    #[test]
    fn test_content_area() {
        let line = LineEntity::new(Point::new(100.0, 100.0), Point::new(300.0, 100.0), Style::default());
        let doc = doc_with(vec![line.into()]);
        let options = SceneOptions {
            area: ExportArea::Content,
            margin: 10.0,
            grid: false,
            background: false,
        };
        let scene = Scene::build(&doc, &MemoryAssetProvider::new(), &options);
        assert_eq!(scene.page, Rect::new(90.0, 90.0, 310.0, 110.0));
        assert!(scene.grid.is_none());
        assert!(scene.background.is_none());
    }

    #[test]
    fn test_icons_resolve_to_symbols_or_placeholders() {
        let signal = IconEntity::new(IconRef::builtin("signal"), Point::new(50.0, 50.0));
        let missing = IconEntity::new(IconRef::picture("depot.png"), Point::new(80.0, 50.0));
        let present = IconEntity::new(IconRef::picture("yard.png"), Point::new(110.0, 50.0));
        let doc = doc_with(vec![signal.into(), missing.into(), present.into()]);
        let assets = MemoryAssetProvider::new();
        assets.insert("yard.png", vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);

        let scene = Scene::build(&doc, &assets, &SceneOptions::default());
        assert!(matches!(&scene.items[0], SceneItem::Symbol { primitives, .. } if primitives.len() == 2));
        assert!(matches!(&scene.items[1], SceneItem::Picture { data: None, .. }));
        assert!(matches!(
            &scene.items[2],
            SceneItem::Picture { data: Some((_, PictureFormat::Png)), .. }
        ));
    }

    #[test]
    fn test_symbol_transform_maps_viewbox_to_extent() {
        let mut icon = IconEntity::new(IconRef::builtin("crossing"), Point::new(50.0, 50.0));
        icon.scale = 2.0;
        let doc = doc_with(vec![icon.into()]);
        let scene = Scene::build(&doc, &MemoryAssetProvider::new(), &SceneOptions::default());
        let SceneItem::Symbol { transform, .. } = &scene.items[0] else {
            panic!("expected a symbol");
        };
        // Half the viewbox lands on the edge of the 32-unit extent
        let edge = *transform * Point::new(500.0, 0.0);
        assert!((edge.x - 66.0).abs() < 1e-9);
        assert!((edge.y - 50.0).abs() < 1e-9);
    }
}
