//! The request and batch script handed to the CAD kernel.
//!
//! The script is a fixed string: nothing is interpolated into it. The paths
//! it operates on travel in a JSON [`CadRequest`] file whose location is
//! passed through the `GLB2STEP_CAD_REQUEST` environment variable.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Environment variable carrying the request file path.
pub const REQUEST_ENV_VAR: &str = "GLB2STEP_CAD_REQUEST";

/// File name of the request inside the job directory.
pub const REQUEST_FILE_NAME: &str = "cad_request.json";

/// Prefix of the stdout line carrying the [`CadReport`].
pub const REPORT_PREFIX: &str = "GLB2STEP_REPORT ";

/// Script exit code when the mesh has no facets.
pub const EXIT_EMPTY_MESH: i32 = 2;

/// Script exit code when no face could be built.
pub const EXIT_NO_VALID_FACES: i32 = 3;

/// Line the script prints before exiting with [`EXIT_EMPTY_MESH`].
pub const EMPTY_MESH_MARKER: &str = "ERROR: No mesh data found";

/// Line the script prints before exiting with [`EXIT_NO_VALID_FACES`].
pub const NO_VALID_FACES_MARKER: &str = "ERROR: No valid faces created";

/// FreeCAD batch script: OBJ mesh → one compound of planar faces → STEP.
///
/// Faces use the first three vertex indices in the order the mesh stores
/// them; orientation is not altered.
pub const CAD_SCRIPT: &str = r#"
import json
import os
import sys

REPORT_PREFIX = "GLB2STEP_REPORT "


def convert(request):
    import FreeCAD
    import Mesh
    import Part

    doc = FreeCAD.newDocument()
    try:
        mesh = Mesh.Mesh(request["input_path"])
        print("Loaded mesh with %d facets" % mesh.CountFacets)
        if mesh.CountFacets == 0:
            print("ERROR: No mesh data found")
            return 2

        vertices, faces = mesh.Topology
        print("Processing %d faces from %d vertices" % (len(faces), len(vertices)))

        shape_faces = []
        errors = 0
        for i, indices in enumerate(faces):
            try:
                if len(indices) < 3:
                    raise ValueError("face %d has fewer than 3 vertices" % i)
                v1 = FreeCAD.Vector(vertices[indices[0]])
                v2 = FreeCAD.Vector(vertices[indices[1]])
                v3 = FreeCAD.Vector(vertices[indices[2]])
                wire = Part.makePolygon([v1, v2, v3, v1])
                shape_faces.append(Part.Face(wire))
            except Exception:
                errors += 1
            if i > 0 and i % 5000 == 0:
                print("Processed %d/%d faces..." % (i, len(faces)))

        print("Created %d valid faces (%d errors)" % (len(shape_faces), errors))
        if not shape_faces:
            print("ERROR: No valid faces created")
            return 3

        compound = Part.makeCompound(shape_faces)
        feature = doc.addObject("Part::Feature", "ConvertedMesh")
        feature.Shape = compound
        doc.recompute()

        Part.export([feature], request["output_path"])

        report = {
            "faces_total": len(faces),
            "faces_built": len(shape_faces),
            "face_errors": errors,
        }
        print(REPORT_PREFIX + json.dumps(report))
        return 0
    finally:
        FreeCAD.closeDocument(doc.Name)


try:
    with open(os.environ["GLB2STEP_CAD_REQUEST"]) as handle:
        code = convert(json.load(handle))
except Exception as exc:
    import traceback
    print("ERROR: %s" % exc)
    traceback.print_exc()
    code = 1

sys.exit(code)
"#;

/// What the CAD kernel should convert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CadRequest {
    /// OBJ mesh to load.
    pub input_path: PathBuf,
    /// STEP file to write.
    pub output_path: PathBuf,
}

impl CadRequest {
    /// Serialize the request into `dir`, returning the file path.
    pub async fn write_to(&self, dir: &Path) -> Result<PathBuf, crate::error::ConversionError> {
        let path = dir.join(REQUEST_FILE_NAME);
        let body = serde_json::to_vec(self)?;
        tokio::fs::write(&path, body).await?;
        Ok(path)
    }
}

/// Face counts printed by the script after a successful export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CadReport {
    /// Faces in the mesh topology.
    pub faces_total: u64,
    /// Faces that made it into the compound.
    pub faces_built: u64,
    /// Faces skipped because they could not be built.
    pub face_errors: u64,
}

impl CadReport {
    /// Find and parse the report line in the kernel's stdout.
    ///
    /// The last matching line wins; malformed lines are ignored.
    pub fn parse(stdout: &str) -> Option<Self> {
        stdout
            .lines()
            .rev()
            .filter_map(|line| line.trim().strip_prefix(REPORT_PREFIX.trim_end()))
            .find_map(|json| serde_json::from_str(json.trim()).ok())
    }
}
