//! The setup file: octree parameters, sampling, and the stock/parts
//! volume blocks.

use std::path::Path;

use swarf_math::{Point3, Vec3};
use swarf_motion::Pose;
use swarf_volume::{Cylinder, Material, Rect, Sphere, StlSolid, Volume};

use crate::lexer::LineLexer;
use crate::Result;

/// How a stock-block volume is applied to the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CsgOp {
    /// Union.
    #[default]
    Sum,
    /// Subtraction.
    Diff,
    /// Intersection.
    Intersect,
}

/// One volume from a STOCK or PARTS block, with its CSG operation.
#[derive(Debug, Clone)]
pub struct StockVolume {
    /// The volume to apply.
    pub volume: Volume,
    /// How to apply it.
    pub op: CsgOp,
}

/// Parsed setup file.
#[derive(Debug, Clone)]
pub struct SetupConfig {
    /// Full side length of the octree root cube.
    pub octree_cube_size: f64,
    /// Maximum subdivision depth.
    pub octree_max_depth: u8,
    /// Octree centre.
    pub octree_center: Point3,
    /// User origin applied to all motions (angles already radians).
    pub user_origin: Pose,
    /// Initial tool position.
    pub initial_position: Pose,
    /// Sampling step size.
    pub step_size: f64,
    /// True if the effective step scales with the cutter diameter.
    pub variable_step: bool,
    /// Specific cutting force coefficient.
    pub specific_cutting_force: f64,
    /// Stock volumes in file order.
    pub stock: Vec<StockVolume>,
    /// Protected part volumes in file order.
    pub parts: Vec<StockVolume>,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            octree_cube_size: 300.0,
            octree_max_depth: 7,
            octree_center: Point3::origin(),
            user_origin: Pose::default(),
            initial_position: Pose::default(),
            step_size: 1.0,
            variable_step: false,
            specific_cutting_force: 1800.0,
            stock: Vec::new(),
            parts: Vec::new(),
        }
    }
}

impl SetupConfig {
    /// Half-scale of the octree root, as the tree constructor wants it.
    pub fn root_scale(&self) -> f64 {
        self.octree_cube_size / 2.0
    }

    /// Parse a setup file. Returns the configuration and the number of
    /// lines that were skipped as erroneous; the caller decides how loud
    /// to be about them.
    pub fn parse_file(path: &Path) -> Result<(Self, usize)> {
        let text = std::fs::read_to_string(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&text, base)
    }

    /// Parse setup text; `base_dir` anchors relative STL paths.
    pub fn parse(text: &str, base_dir: &Path) -> Result<(Self, usize)> {
        let mut config = Self::default();
        let mut errors = 0usize;
        let mut lines = text.lines().enumerate();

        while let Some((lineno, line)) = lines.next() {
            let lex = LineLexer::new(line);
            if lex.is_empty() {
                continue;
            }
            let lineno = lineno + 1;
            if lex.word_match("OCTREE_CUBE_SIZE", 0) {
                match lex.token_f64(1) {
                    Some(size) if size > 0.0 => config.octree_cube_size = size,
                    _ => errors += report(lineno, line),
                }
            } else if lex.word_match("OCTREE_MAX_DEPTH", 0) {
                match lex.token_i64(1) {
                    Some(depth) if depth >= 3 => config.octree_max_depth = depth as u8,
                    _ => errors += report(lineno, line),
                }
            } else if lex.word_match("OCTREE_CENTER", 0) {
                match lex.token_triple(1) {
                    Some([x, y, z]) => config.octree_center = Point3::new(x, y, z),
                    None => errors += report(lineno, line),
                }
            } else if lex.word_match("USER_ORIGIN", 0) {
                match parse_pose(&lex) {
                    Some(pose) => config.user_origin = pose,
                    None => errors += report(lineno, line),
                }
            } else if lex.word_match("INITIAL_POSITION", 0) {
                match parse_pose(&lex) {
                    Some(pose) => config.initial_position = pose,
                    None => errors += report(lineno, line),
                }
            } else if lex.word_match("STEP_SIZE", 0) {
                let size = lex.token_f64(2);
                match (lex.token(1), size) {
                    (Some("VARIABLE"), Some(s)) if s > 0.0 => {
                        config.step_size = s;
                        config.variable_step = true;
                    }
                    (Some("FIXED"), Some(s)) if s > 0.0 => {
                        config.step_size = s;
                        config.variable_step = false;
                    }
                    _ => errors += report(lineno, line),
                }
            } else if lex.word_match("SCF", 0) {
                match lex.token_f64(1) {
                    Some(k) if k > 0.0 => config.specific_cutting_force = k,
                    _ => errors += report(lineno, line),
                }
            } else if lex.word_match("STOCK", 0) || lex.word_match("PARTS", 0) {
                let parts = lex.word_match("PARTS", 0);
                match parse_stock_block(&mut lines, parts, base_dir, &mut errors) {
                    Some(stock) => {
                        if parts {
                            config.parts.push(stock);
                        } else {
                            config.stock.push(stock);
                        }
                    }
                    None => errors += 1,
                }
            } else {
                log::debug!("setup: ignoring line {lineno}: {line}");
            }
        }
        Ok((config, errors))
    }
}

fn report(lineno: usize, line: &str) -> usize {
    log::warn!("setup: error at line {lineno}: {line}");
    1
}

/// `<x> <y> <z> [<a> <b> <c>]`, angles in degrees.
fn parse_pose(lex: &LineLexer) -> Option<Pose> {
    let [x, y, z] = lex.token_triple(1)?;
    let dir = match lex.token_triple(4) {
        Some([a, b, c]) => Vec3::new(a.to_radians(), b.to_radians(), c.to_radians()),
        None if lex.len() <= 4 => Vec3::zeros(),
        None => return None,
    };
    Some(Pose::new(Vec3::new(x, y, z), dir))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShapeKind {
    None,
    Rectangle,
    Cylinder,
    Sphere,
    Stl,
}

/// Parse one `STOCK … END STOCK` (or PARTS) block into a volume.
fn parse_stock_block<'a, I>(
    lines: &mut I,
    parts: bool,
    base_dir: &Path,
    errors: &mut usize,
) -> Option<StockVolume>
where
    I: Iterator<Item = (usize, &'a str)>,
{
    let material = if parts {
        Material::Parts
    } else {
        Material::Stock
    };
    let end_word = if parts { "PARTS" } else { "STOCK" };

    let mut kind = ShapeKind::None;
    let mut width = 0.0;
    let mut length = 0.0;
    let mut height = 0.0;
    let mut radius = 0.0;
    let mut corner: Option<Point3> = None;
    let mut center = Point3::origin();
    let mut rotation_center = Point3::origin();
    let mut angle = Vec3::zeros();
    let mut op = CsgOp::Sum;
    let mut file: Option<std::path::PathBuf> = None;

    for (lineno, line) in lines.by_ref() {
        let lex = LineLexer::new(line);
        if lex.is_empty() {
            continue;
        }
        let lineno = lineno + 1;
        if lex.word_match("END", 0) && lex.word_match(end_word, 1) {
            break;
        }
        if lex.word_match("RECTANGLE", 0) {
            kind = ShapeKind::Rectangle;
        } else if lex.word_match("CYLINDER", 0) {
            kind = ShapeKind::Cylinder;
        } else if lex.word_match("SPHERE", 0) {
            kind = ShapeKind::Sphere;
        } else if lex.word_match("STL", 0) {
            kind = ShapeKind::Stl;
        } else if lex.word_match("WIDTH", 0) {
            match lex.token_f64(1) {
                Some(v) => width = v,
                None => *errors += report(lineno, line),
            }
        } else if lex.word_match("LENGTH", 0) {
            match lex.token_f64(1) {
                Some(v) => length = v,
                None => *errors += report(lineno, line),
            }
        } else if lex.word_match("HIGHT", 0) {
            match lex.token_f64(1) {
                Some(v) => height = v,
                None => *errors += report(lineno, line),
            }
        } else if lex.word_match("RADIUS", 0) {
            match lex.token_f64(1) {
                Some(v) => radius = v,
                None => *errors += report(lineno, line),
            }
        } else if lex.word_match("CORNER", 0) {
            match lex.token_triple(1) {
                Some([x, y, z]) => corner = Some(Point3::new(x, y, z)),
                None => *errors += report(lineno, line),
            }
        } else if lex.word_match("CENTER", 0) {
            match lex.token_triple(1) {
                Some([x, y, z]) => center = Point3::new(x, y, z),
                None => *errors += report(lineno, line),
            }
        } else if lex.word_match("RCENTER", 0) {
            match lex.token_triple(1) {
                Some([x, y, z]) => rotation_center = Point3::new(x, y, z),
                None => *errors += report(lineno, line),
            }
        } else if lex.word_match("ROTATION", 0) {
            match lex.token_triple(1) {
                Some([a, b, c]) => {
                    angle = Vec3::new(a.to_radians(), b.to_radians(), c.to_radians())
                }
                None => *errors += report(lineno, line),
            }
        } else if lex.word_match("OPERATION", 0) {
            if lex.word_match("SUM", 1) {
                op = CsgOp::Sum;
            } else if lex.word_match("DIFF", 1) {
                op = CsgOp::Diff;
            } else if lex.word_match("INTERSECT", 1) {
                op = CsgOp::Intersect;
            } else {
                *errors += report(lineno, line);
            }
        } else if lex.word_match("FILE", 0) {
            match lex.token(1) {
                Some(p) => file = Some(base_dir.join(p)),
                None => *errors += report(lineno, line),
            }
        } else {
            log::debug!("stock block: ignoring line {lineno}: {line}");
        }
    }

    let volume = match kind {
        ShapeKind::Rectangle => {
            if width <= 0.0 || length <= 0.0 || height <= 0.0 {
                log::warn!("stock block: rectangle with non-positive dimensions");
                return None;
            }
            let rect = match corner {
                Some(c) => Rect::from_corner(c, width, length, height),
                None => Rect::from_center(center, width, length, height),
            };
            Volume::Rect(
                rect.with_material(material)
                    .with_rotation(rotation_center, angle),
            )
        }
        ShapeKind::Cylinder => {
            if radius <= 0.0 || length <= 0.0 {
                log::warn!("stock block: cylinder with non-positive dimensions");
                return None;
            }
            Volume::Cylinder(
                Cylinder::new(center, radius, length)
                    .with_material(material)
                    .with_rotation(rotation_center, angle),
            )
        }
        ShapeKind::Sphere => {
            if radius <= 0.0 {
                log::warn!("stock block: sphere with non-positive radius");
                return None;
            }
            Volume::Sphere(Sphere::new(center, radius, material))
        }
        ShapeKind::Stl => {
            let path = file?;
            match StlSolid::read_file(&path, material) {
                Ok(mut solid) => {
                    solid.place(center.coords, rotation_center, angle);
                    Volume::Stl(solid)
                }
                Err(e) => {
                    log::warn!("stock block: {e}");
                    return None;
                }
            }
        }
        ShapeKind::None => {
            log::warn!("stock block without a shape");
            return None;
        }
    };
    Some(StockVolume { volume, op })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> (SetupConfig, usize) {
        SetupConfig::parse(text, Path::new(".")).unwrap()
    }

    #[test]
    fn test_basic_directives() {
        let (config, errors) = parse(
            "OCTREE_CUBE_SIZE 40.0\n\
             OCTREE_MAX_DEPTH 6\n\
             OCTREE_CENTER 0.0 0.0 -5.0\n\
             STEP_SIZE FIXED 0.5\n\
             SCF 2400.0\n",
        );
        assert_eq!(errors, 0);
        assert_eq!(config.octree_cube_size, 40.0);
        assert_eq!(config.root_scale(), 20.0);
        assert_eq!(config.octree_max_depth, 6);
        assert_eq!(config.octree_center, Point3::new(0.0, 0.0, -5.0));
        assert_eq!(config.step_size, 0.5);
        assert!(!config.variable_step);
        assert_eq!(config.specific_cutting_force, 2400.0);
    }

    #[test]
    fn test_variable_step() {
        let (config, errors) = parse("STEP_SIZE VARIABLE 0.25\n");
        assert_eq!(errors, 0);
        assert!(config.variable_step);
        assert_eq!(config.step_size, 0.25);
    }

    #[test]
    fn test_origin_angles_degrees_to_radians() {
        let (config, errors) = parse("USER_ORIGIN 1.0 2.0 3.0 90.0 0.0 -90.0\n");
        assert_eq!(errors, 0);
        assert_eq!(config.user_origin.loc, Vec3::new(1.0, 2.0, 3.0));
        assert!((config.user_origin.dir.x - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!((config.user_origin.dir.z + std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_bad_lines_recovered_and_counted() {
        let (config, errors) = parse(
            "OCTREE_CUBE_SIZE nope\n\
             OCTREE_MAX_DEPTH 2\n\
             SCF 1500.0\n",
        );
        // both bad lines skipped, the good one applied
        assert_eq!(errors, 2);
        assert_eq!(config.octree_cube_size, 300.0);
        assert_eq!(config.octree_max_depth, 7);
        assert_eq!(config.specific_cutting_force, 1500.0);
    }

    #[test]
    fn test_stock_block_rectangle() {
        let (config, errors) = parse(
            "STOCK\n\
             RECTANGLE\n\
             WIDTH 10.0\n\
             LENGTH 20.0\n\
             HIGHT 5.0\n\
             CORNER -5.0 -10.0 0.0\n\
             OPERATION SUM\n\
             END STOCK\n",
        );
        assert_eq!(errors, 0);
        assert_eq!(config.stock.len(), 1);
        let stock = &config.stock[0];
        assert_eq!(stock.op, CsgOp::Sum);
        assert_eq!(stock.volume.material(), Material::Stock);
        assert!(stock.volume.dist(Point3::new(0.0, 0.0, 2.5)) > 0.0);
    }

    #[test]
    fn test_parts_block_sphere_with_diff_stock() {
        let (config, errors) = parse(
            "STOCK\n\
             CYLINDER\n\
             RADIUS 5.0\n\
             LENGTH 10.0\n\
             CENTER 0.0 0.0 0.0\n\
             OPERATION DIFF\n\
             END STOCK\n\
             PARTS\n\
             SPHERE\n\
             RADIUS 2.0\n\
             CENTER 0.0 0.0 0.0\n\
             END PARTS\n",
        );
        assert_eq!(errors, 0);
        assert_eq!(config.stock.len(), 1);
        assert_eq!(config.stock[0].op, CsgOp::Diff);
        assert_eq!(config.parts.len(), 1);
        assert_eq!(config.parts[0].volume.material(), Material::Parts);
    }

    #[test]
    fn test_stock_block_missing_shape_is_error() {
        let (config, errors) = parse("STOCK\nWIDTH 5.0\nEND STOCK\n");
        assert!(config.stock.is_empty());
        assert_eq!(errors, 1);
    }

    #[test]
    fn test_stock_rotation_in_degrees() {
        let (config, _) = parse(
            "STOCK\n\
             RECTANGLE\n\
             WIDTH 2.0\nLENGTH 2.0\nHIGHT 2.0\n\
             CENTER 0.0 0.0 0.0\n\
             RCENTER 0.0 0.0 0.0\n\
             ROTATION 0.0 0.0 45.0\n\
             END STOCK\n",
        );
        let v = &config.stock[0].volume;
        // the box was rotated 45° about Z: its bounding box grew
        let bb = v.aabb();
        assert!(bb.max().x > 1.2);
    }
}
