use crate::{mesh::Mesh, Pos};

// "Closest Point on Triangle to Point" from Real-Time Collision Detection by Christer Ericson
pub fn closest_point(mesh: &Mesh, face_idx: usize, point: Pos) -> Pos {
    let [v0, v1, v2] = mesh.face_verts(face_idx);
    closest_point_on_triangle([v0, v1, v2], point)
}

pub fn closest_point_on_triangle([v0, v1, v2]: [Pos; 3], point: Pos) -> Pos {
    let ab = v1 - v0;
    let ac = v2 - v0;
    let bc = v2 - v1;

    // Parametric position s for the projection of P on AB
    let snom = (point - v0).dot(&ab);
    let sdenom = (point - v1).dot(&(v0 - v1));

    // Parametric position t for the projection of P on AC
    let tnom = (point - v0).dot(&ac);
    let tdenom = (point - v2).dot(&(v0 - v2));
    if snom <= 0.0 && tnom <= 0.0 {
        return v0;
    }

    // Parametric position u for the projection of P on BC
    let unom = (point - v1).dot(&bc);
    if sdenom <= 0.0 && unom <= 0.0 {
        return v1;
    }

    let udenom = (point - v2).dot(&(v1 - v2));
    if tdenom <= 0.0 && udenom <= 0.0 {
        return v2;
    }

    // P is outside (or on) AB if the triple scalar product [N PA PB] <= 0
    let n = ab.cross(&ac);
    let vc = n.dot(&(v0 - point).cross(&(v1 - point)));
    if vc <= 0.0 && snom >= 0.0 && sdenom >= 0.0 {
        return v0 + snom / (snom + sdenom) * ab;
    }

    let va = n.dot(&(v1 - point).cross(&(v2 - point)));
    if va <= 0.0 && unom >= 0.0 && udenom >= 0.0 {
        return v1 + unom / (unom + udenom) * bc;
    }

    let vb = n.dot(&(v2 - point).cross(&(v0 - point)));
    if vb <= 0.0 && tnom >= 0.0 && tdenom >= 0.0 {
        return v0 + tnom / (tnom + tdenom) * ac;
    }

    // Zero area triangles fall through every region test above
    let sum = va + vb + vc;
    if sum.abs() <= f32::EPSILON {
        return v0;
    }

    // P projects inside the face, use barycentric coordinates
    let u = va / sum;
    let v = vb / sum;
    let w = 1.0 - u - v;

    u * v0 + v * v1 + w * v2
}
